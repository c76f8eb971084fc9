//! Fitted explainable boosting model.
//!
//! # Overview
//!
//! - [`EbmModel`]: the fitted additive model, built through a validating builder
//! - [`Term`]: one additive lookup term (main effect or interaction)
//! - [`FeatureBinning`]: bucket boundaries, extrema and histogram of a feature
//! - [`Task`], [`ClassLabel`], [`FeatureInfo`]: metadata
//!
//! # Example
//!
//! ```ignore
//! use ebm_persist::model::{EbmModel, FeatureInfo, Task};
//! use ebm_persist::{JsonWriteOptions, ReadOptions};
//!
//! let model = EbmModel::builder()
//!     .features(features)
//!     .task(Task::classification(["no", "yes"]))
//!     .intercept(-0.3)
//!     .terms(terms)
//!     .binning(binning)
//!     .build()?;
//!
//! let proba = model.predict_proba(x.view())?;
//! model.save_json("model.json", &JsonWriteOptions::default())?;
//! let loaded = EbmModel::load_json("model.json", &ReadOptions::default())?;
//! ```

mod binning;
mod ebm;
mod meta;
mod term;

pub use binning::{FeatureBinning, Histogram};
pub use ebm::{EbmModel, ModelError, Predictions};
pub use meta::{ClassLabel, FeatureInfo, FeatureKind, ModelVariant, ParseFeatureKindError, Task};
pub use term::Term;
