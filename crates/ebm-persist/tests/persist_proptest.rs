//! Property-based tests for model persistence.
//!
//! These tests use proptest to generate arbitrary fitted models and verify
//! that capture, encode, decode and rebuild reproduce them exactly.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array2, ArrayD, IxDyn};
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use ebm_persist::model::{EbmModel, FeatureBinning, FeatureInfo, FeatureKind, Task, Term};
use ebm_persist::persist::{ModelStateDto, StableHash, capture, rebuild};
use ebm_persist::{JsonWriteOptions, ReadOptions};

// =============================================================================
// Arbitrary Model Generators
// =============================================================================

/// Strategy for finite f64 values of moderate magnitude.
fn arb_finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::ANY
        .prop_filter("must be finite", |x| x.is_finite())
        .prop_map(|x| x.clamp(-1e6, 1e6))
}

/// Strictly increasing bin edges, built from positive gaps.
fn arb_edges() -> impl Strategy<Value = Vec<f64>> {
    (arb_finite_f64(), prop_vec(0.001f64..100.0, 0..5)).prop_map(|(start, gaps)| {
        let mut edges = Vec::with_capacity(gaps.len());
        let mut at = start;
        for gap in gaps {
            at += gap;
            edges.push(at);
        }
        edges
    })
}

fn arb_feature() -> impl Strategy<Value = (FeatureInfo, FeatureBinning)> {
    (
        "[a-z]{1,8}",
        any::<bool>(),
        0u64..10_000,
        0.0f64..=1.0,
        arb_edges(),
    )
        .prop_map(|(name, categorical, n_unique, nonzero, edges)| {
            let kind = if categorical {
                FeatureKind::Categorical
            } else {
                FeatureKind::Continuous
            };
            let min = edges.first().copied().unwrap_or(0.0) - 1.0;
            let max = edges.last().copied().unwrap_or(0.0) + 1.0;
            (
                FeatureInfo::new(name, kind).with_stats(n_unique, nonzero),
                FeatureBinning::new(edges, min, max),
            )
        })
}

/// Regression or classification with labels in arbitrary order.
fn arb_task() -> impl Strategy<Value = Task> {
    prop_oneof![
        Just(Task::Regression),
        Just(vec!["no", "yes"])
            .prop_shuffle()
            .prop_map(|labels| Task::classification(labels)),
        Just(vec![10i64, 20, 30])
            .prop_shuffle()
            .prop_map(|labels| Task::classification(labels)),
    ]
}

/// Fill a grid of the given shape from a cyclic list of values.
fn fill(shape: &[usize], values: &[f64]) -> ArrayD<f64> {
    let mut i = 0;
    ArrayD::from_shape_simple_fn(IxDyn(shape), || {
        let v = values[i % values.len()];
        i += 1;
        v
    })
}

/// Arbitrary valid model: a main effect for some features, an optional
/// pairwise interaction of the first two, and binning for every feature a
/// term uses.
fn arb_model() -> impl Strategy<Value = EbmModel> {
    (
        prop_vec((arb_feature(), any::<bool>()), 1..4),
        arb_task(),
        arb_finite_f64(),
        prop_vec(arb_finite_f64(), 1..16),
        any::<bool>(),
    )
        .prop_map(|(features, task, intercept, values, with_pair)| {
            let class_axis = match task.n_scores() {
                1 => None,
                k => Some(k),
            };
            let shape_of = |members: &[usize]| {
                let mut shape: Vec<usize> =
                    members.iter().map(|&f| features[f].0.1.n_bins()).collect();
                shape.extend(class_axis);
                shape
            };

            let mut groups: Vec<Vec<usize>> = features
                .iter()
                .enumerate()
                .filter(|(_, (_, main))| *main)
                .map(|(f, _)| vec![f])
                .collect();
            if with_pair && features.len() > 1 {
                groups.push(vec![0, 1]);
            }
            let terms = groups
                .iter()
                .enumerate()
                .map(|(t, members)| {
                    let shape = shape_of(members);
                    Term::new(members.clone(), fill(&shape, &values))
                        .with_standard_deviations(ArrayD::from_elem(IxDyn(&shape), 0.01))
                        .with_importance(t as f64)
                })
                .collect();
            let interactions = groups.iter().filter(|g| g.len() > 1).cloned().collect();

            let used: BTreeSet<usize> = groups.iter().flatten().copied().collect();
            let binning: BTreeMap<usize, FeatureBinning> = used
                .iter()
                .map(|&f| (f, features[f].0.1.clone()))
                .collect();
            EbmModel::builder()
                .features(features.into_iter().map(|((info, _), _)| info).collect())
                .task(task)
                .intercept(intercept)
                .terms(terms)
                .binning(binning)
                .interactions(interactions)
                .build()
                .expect("generated model is valid")
        })
}

fn roundtrip(model: &EbmModel, options: &JsonWriteOptions) -> (ModelStateDto, ModelStateDto) {
    let dto = capture(model).expect("capture");
    let text = dto.to_json_string(options).expect("encode");
    let back = ModelStateDto::from_json_str(&text, &ReadOptions::default()).expect("decode");
    (dto, back)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_roundtrips_exactly(model in arb_model()) {
        let (dto, back) = roundtrip(&model, &JsonWriteOptions::compact());
        prop_assert_eq!(&back, &dto);
        prop_assert_eq!(back.stable_hash(), dto.stable_hash());
    }

    #[test]
    fn rebuilt_model_predicts_identically(
        model in arb_model(),
        rows in prop_vec(arb_finite_f64(), 3..30),
    ) {
        let (_, back) = roundtrip(&model, &JsonWriteOptions::pretty());
        let rebuilt = rebuild(back).expect("rebuild");

        let n_features = model.n_features();
        let n_rows = rows.len() / n_features;
        prop_assume!(n_rows > 0);
        let x = Array2::from_shape_vec((n_rows, n_features), rows[..n_rows * n_features].to_vec())
            .expect("shape");

        prop_assert_eq!(
            rebuilt.predict_scores(x.view()).expect("predict"),
            model.predict_scores(x.view()).expect("predict")
        );
        prop_assert_eq!(rebuilt.features(), model.features());
        prop_assert_eq!(rebuilt.task(), model.task());
        prop_assert_eq!(rebuilt.terms(), model.terms());
        prop_assert_eq!(rebuilt.binning(), model.binning());
    }

    #[test]
    fn legacy_layout_roundtrips(model in arb_model()) {
        let mut dto = capture(&model).expect("capture");
        dto.schema_version = ebm_persist::SchemaVersion::new(0, 1, 0);
        let text = dto.to_json_string(&JsonWriteOptions::compact()).expect("encode");
        let back = ModelStateDto::from_json_str(&text, &ReadOptions::default()).expect("decode");
        prop_assert_eq!(back, dto);
    }
}
