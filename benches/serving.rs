//! Request-path benchmarks: materialization and end-to-end prediction.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use boosters_serving::config::DEFAULT_MODEL_FILE_NAME;
use boosters_serving::data::materialize;
use boosters_serving::testing::write_model_dir;
use boosters_serving::{
    CatBoostEngine, FeatureBatch, LatencyRecorder, ModelLoader, Parallelism, Predictor,
    SparseFeatureVector,
};

const N_FEATURES: u64 = 256;
const NNZ: u64 = 32;
const BATCH_SIZES: &[usize] = &[1, 64, 1024];

fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(10))
        .sample_size(20)
}

/// Deterministic sparse batch: `NNZ` features per example spread over `N_FEATURES`.
///
/// Every example sets the last feature so the dense width always matches the model.
fn sparse_batch(batch_size: usize) -> FeatureBatch {
    (0..batch_size as u64)
        .map(|row| {
            let pairs = (0..NNZ).map(|k| {
                let id = (row * 31 + k * 97) % N_FEATURES;
                let score = ((row + k) % 17) as f32 / 8.0 - 1.0;
                (id, score)
            });
            SparseFeatureVector::from_pairs(pairs.chain([(N_FEATURES - 1, 0.5)]))
        })
        .collect()
}

/// Symmetric forest of `n_trees` depth-6 trees over `N_FEATURES` float features.
fn forest_json(n_trees: usize) -> String {
    let float_features: Vec<_> = (0..N_FEATURES)
        .map(|i| json!({"feature_index": i, "flat_feature_index": i, "borders": [0.0]}))
        .collect();
    let trees: Vec<_> = (0..n_trees)
        .map(|t| {
            let splits: Vec<_> = (0..6)
                .map(|d| {
                    let feature = (t as u64 * 13 + d * 41) % N_FEATURES;
                    json!({"float_feature_index": feature, "border": 0.0, "split_type": "FloatFeature"})
                })
                .collect();
            let leaves: Vec<f64> = (0..64).map(|l| ((l * 7 + t) % 11) as f64 / 100.0).collect();
            json!({"splits": splits, "leaf_values": leaves})
        })
        .collect();
    json!({
        "features_info": {"float_features": float_features},
        "oblivious_trees": trees,
        "scale_and_bias": [1.0, [0.0]]
    })
    .to_string()
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("component/materialize");
    for &batch_size in BATCH_SIZES {
        let batch = sparse_batch(batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch, |b, batch| {
            b.iter(|| black_box(materialize(black_box(batch)).unwrap()))
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let tmp = tempfile::tempdir().unwrap();
    let dir = write_model_dir(tmp.path(), 1, DEFAULT_MODEL_FILE_NAME, &forest_json(200));
    let latency = Arc::new(LatencyRecorder::new("bench_predict_latency_us").unwrap());
    let predictor = Predictor::new(latency);

    let mut group = c.benchmark_group("e2e/predict/200x6");
    for (label, parallelism) in [("sequential", Parallelism::Sequential), ("parallel", Parallelism::Parallel)] {
        let loader = ModelLoader::new(Arc::new(CatBoostEngine::new(parallelism)));
        let artifact = loader.load(&dir, 1).unwrap();
        for &batch_size in BATCH_SIZES {
            let batch = sparse_batch(batch_size);
            group.throughput(Throughput::Elements(batch_size as u64));
            group.bench_with_input(BenchmarkId::new(label, batch_size), &batch, |b, batch| {
                b.iter(|| black_box(predictor.predict(&artifact, black_box(batch)).unwrap()))
            });
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = default_criterion();
    targets = bench_materialize, bench_predict
}
criterion_main!(benches);
