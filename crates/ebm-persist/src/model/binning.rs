//! Per-feature binning.
//!
//! A feature with `k` bin edges has `k + 1` buckets. Bucket assignment counts
//! the edges that are less than or equal to the value, so a value equal to an
//! edge falls into the bucket above it.

use super::ModelError;

/// Diagnostic histogram of a feature's training distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Histogram bin boundaries.
    pub edges: Vec<f64>,
    /// Count per histogram bin, one fewer than `edges`.
    pub counts: Vec<f64>,
}

impl Histogram {
    pub fn new(edges: Vec<f64>, counts: Vec<f64>) -> Self {
        Self { edges, counts }
    }
}

/// Binning state of one feature: edges, observed extrema, optional histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBinning {
    /// Strictly increasing, finite bucket boundaries.
    pub edges: Vec<f64>,
    /// Smallest value seen during fitting.
    pub min: f64,
    /// Largest value seen during fitting.
    pub max: f64,
    /// Optional display histogram.
    pub histogram: Option<Histogram>,
}

impl FeatureBinning {
    /// Create binning without a histogram.
    pub fn new(edges: Vec<f64>, min: f64, max: f64) -> Self {
        Self {
            edges,
            min,
            max,
            histogram: None,
        }
    }

    /// Attach a histogram.
    pub fn with_histogram(mut self, histogram: Histogram) -> Self {
        self.histogram = Some(histogram);
        self
    }

    /// Number of buckets.
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.edges.len() + 1
    }

    /// Bucket index of `x`. NaN maps to bucket 0.
    #[inline]
    pub fn bin(&self, x: f64) -> usize {
        if x.is_nan() {
            return 0;
        }
        self.edges.partition_point(|&e| e <= x)
    }

    pub(crate) fn validate(&self, feature: usize) -> Result<(), ModelError> {
        if let Some(position) = self.edges.iter().position(|e| !e.is_finite()) {
            return Err(ModelError::NonMonotonicEdges { feature, position });
        }
        if let Some(position) = self.edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(ModelError::NonMonotonicEdges {
                feature,
                position: position + 1,
            });
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ModelError::NonFinite {
                context: format!("extrema of feature {feature}"),
            });
        }
        if let Some(hist) = &self.histogram {
            let paired = hist.counts.len() + 1 == hist.edges.len()
                || (hist.edges.is_empty() && hist.counts.is_empty());
            if !paired {
                return Err(ModelError::HistogramMismatch {
                    feature,
                    edges: hist.edges.len(),
                    counts: hist.counts.len(),
                });
            }
            if hist.edges.iter().chain(&hist.counts).any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite {
                    context: format!("histogram of feature {feature}"),
                });
            }
        }
        Ok(())
    }
}
