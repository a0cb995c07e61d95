//! Score a JSON prediction request against one model version directory.
//!
//! Examples:
//! - From a file:
//!   `cargo run --bin predict_batch --release -- --model-dir models/ctr/7 --name ctr --version 7 --request req.json`
//!
//! - From stdin, 4 engine threads, with load/predict logs:
//!   `RUST_LOG=boosters_serving=debug cargo run --bin predict_batch -- --model-dir models/ctr/7 --threads 4 < req.json`
//!
//! The request's model spec is filled in from `--name`/`--version` when absent.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use boosters_serving::inference::ModelSpec;
use boosters_serving::{
    CatBoostEngine, LatencyRecorder, LatencySink, ModelLoader, PredictRequest, PredictionService,
    Predictor, ServableRegistry, ServingConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
struct Args {
    model_dir: PathBuf,
    name: String,
    version: i64,
    request: Option<PathBuf>,
    config: Option<PathBuf>,
    threads: Option<usize>,
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "predict_batch --model-dir DIR [--name NAME] [--version N] [--request FILE] \
         [--config FILE] [--threads N]\n\n\
         Reads a JSON PredictRequest from FILE (or stdin) and prints the JSON response."
    );
    std::process::exit(0);
}

fn parse_args() -> Result<Args, BoxError> {
    let mut model_dir: Option<PathBuf> = None;
    let mut name = "default".to_owned();
    let mut version = 1i64;
    let mut request: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut threads: Option<usize> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{arg} requires a value"));
        match arg.as_str() {
            "--model-dir" => model_dir = Some(PathBuf::from(value()?)),
            "--name" => name = value()?,
            "--version" => version = value()?.parse()?,
            "--request" => request = Some(PathBuf::from(value()?)),
            "--config" => config = Some(PathBuf::from(value()?)),
            "--threads" => threads = Some(value()?.parse()?),
            "--help" | "-h" => print_help_and_exit(),
            other => return Err(format!("unknown arg: {other}").into()),
        }
    }

    Ok(Args {
        model_dir: model_dir.ok_or("--model-dir is required")?,
        name,
        version,
        request,
        config,
        threads,
    })
}

fn load_config(args: &Args) -> Result<ServingConfig, BoxError> {
    let mut config = match &args.config {
        Some(path) => ServingConfig::from_json_reader(BufReader::new(File::open(path)?))?,
        None => ServingConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.n_threads = threads;
    }
    Ok(config)
}

fn read_request(args: &Args) -> Result<PredictRequest, BoxError> {
    let mut request: PredictRequest = match &args.request {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            serde_json::from_str(&text)?
        }
    };
    if request.model_spec.is_none() {
        request.model_spec = Some(ModelSpec::new(args.name.clone()).with_version(args.version));
    }
    Ok(request)
}

fn run(args: &Args) -> Result<(), BoxError> {
    let config = load_config(args)?;
    let engine = CatBoostEngine::from_threads(config.n_threads)?;
    let loader = ModelLoader::from_config(Arc::new(engine), &config);

    let registry = Arc::new(ServableRegistry::new());
    registry.load_and_publish(&loader, &args.name, args.model_dir.clone(), args.version)?;

    let latency = Arc::new(LatencyRecorder::new(boosters_serving::metrics::DEFAULT_LATENCY_METRIC)?);
    let sink: Arc<dyn LatencySink> = latency.clone();
    let service = PredictionService::new(registry, Predictor::from_config(sink, &config), config);

    let request = read_request(args)?;
    let response = service.predict(&request)?;
    info!(
        model = %args.name,
        latency_us = latency.mean_micros().unwrap_or_default(),
        "request served"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &response)?;
    writeln!(out)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let result = parse_args().and_then(|args| run(&args));
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
