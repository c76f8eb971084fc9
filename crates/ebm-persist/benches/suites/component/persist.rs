//! Component benchmarks: model-state read/write performance.
//!
//! Models are sized by feature count; every feature gets a main effect and
//! every adjacent feature pair an interaction with 32 x 32 bins.

use std::collections::BTreeMap;
use std::time::Duration;

use ebm_persist::codec::{self, Value};
use ebm_persist::model::{EbmModel, FeatureBinning, FeatureInfo, Task, Term};
use ebm_persist::persist::{self, StableHash};
use ebm_persist::{JsonWriteOptions, ReadOptions};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ndarray::{ArrayD, IxDyn};

const N_EDGES: usize = 31;

/// Persist operations run in milliseconds, so short windows with more
/// samples are enough. Command-line flags still override these.
fn persist_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(30)
}

/// Build a regression model with `n_features` main effects and
/// `n_features - 1` pairwise interactions.
fn build_test_model(n_features: usize) -> EbmModel {
    let features = (0..n_features)
        .map(|f| FeatureInfo::continuous(format!("f{f}")).with_stats(1_000, 0.9))
        .collect();
    let binning: BTreeMap<usize, FeatureBinning> = (0..n_features)
        .map(|f| {
            let edges = (0..N_EDGES).map(|i| i as f64 + 0.5).collect();
            (f, FeatureBinning::new(edges, 0.0, N_EDGES as f64 + 1.0))
        })
        .collect();

    let n_bins = N_EDGES + 1;
    let grid = |shape: &[usize], seed: usize| {
        let mut i = seed;
        ArrayD::from_shape_simple_fn(IxDyn(shape), || {
            i += 1;
            ((i * 7919) % 1000) as f64 / 1000.0 - 0.5
        })
    };

    let mut terms: Vec<Term> = (0..n_features)
        .map(|f| Term::new(vec![f], grid(&[n_bins], f)).with_importance(0.1))
        .collect();
    let mut interactions = Vec::new();
    for f in 1..n_features {
        terms.push(Term::new(vec![f - 1, f], grid(&[n_bins, n_bins], f)).with_importance(0.01));
        interactions.push(vec![f - 1, f]);
    }

    EbmModel::builder()
        .features(features)
        .task(Task::Regression)
        .intercept(0.5)
        .terms(terms)
        .binning(binning)
        .interactions(interactions)
        .build()
        .unwrap()
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("component/persist/write");

    for n_features in [10, 100] {
        let model = build_test_model(n_features);
        group.throughput(Throughput::Elements(model.terms().len() as u64));
        group.bench_function(BenchmarkId::new("json", n_features), |b| {
            b.iter(|| {
                let mut buf = Vec::with_capacity(1024 * 1024);
                model
                    .write_json_into(&mut buf, &JsonWriteOptions::compact())
                    .unwrap();
                black_box(buf)
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("component/persist/read");

    for n_features in [10, 100] {
        let model = build_test_model(n_features);
        let mut buf = Vec::new();
        model
            .write_json_into(&mut buf, &JsonWriteOptions::compact())
            .unwrap();
        group.throughput(Throughput::Bytes(buf.len() as u64));

        group.bench_function(BenchmarkId::new("json", n_features), |b| {
            b.iter(|| {
                let loaded =
                    EbmModel::read_json_from(buf.as_slice(), &ReadOptions::default()).unwrap();
                black_box(loaded)
            });
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let model = build_test_model(100);
    let dto = persist::capture(&model).unwrap();
    let json = persist::state_to_json(&dto).unwrap();
    let document = ebm_persist::validate::for_layout(persist::Layout::Current).unwrap();

    let mut group = c.benchmark_group("component/persist/validate");
    group.bench_function("current_layout", |b| {
        b.iter(|| black_box(ebm_persist::validate::validate(&json, document)))
    });
    group.finish();
}

fn bench_codec_fragment(c: &mut Criterion) {
    let dto = persist::capture(&build_test_model(10)).unwrap();
    let value = Value::Seq(vec![Value::from("state"), Value::from(dto)]);
    let text = codec::encode_with(&value, &JsonWriteOptions::compact()).unwrap();

    let mut group = c.benchmark_group("component/persist/codec");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("decode_model_state", |b| {
        b.iter(|| black_box(codec::decode(&text).unwrap()))
    });
    group.finish();
}

fn bench_stable_hash(c: &mut Criterion) {
    let dto = persist::capture(&build_test_model(100)).unwrap();

    let mut group = c.benchmark_group("component/persist/hash");
    group.bench_function("model_state", |b| b.iter(|| black_box(dto.stable_hash())));
    group.finish();
}

criterion_group! {
    name = persist_benches;
    config = persist_criterion();
    targets =
        bench_write,
        bench_read,
        bench_validate,
        bench_codec_fragment,
        bench_stable_hash,
}

criterion_main!(persist_benches);
