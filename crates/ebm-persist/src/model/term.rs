//! Additive terms.

use ndarray::{ArrayD, ArrayViewD, Axis};

/// One additive term: a lookup grid over the buckets of its member features.
///
/// The grid has one axis per member feature (length = that feature's bucket
/// count), followed by a class axis for multiclass models. `scores` and
/// `standard_deviations` always share a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// Member feature indices, in axis order.
    pub features: Vec<usize>,
    /// Learned score per bucket cell.
    pub scores: ArrayD<f64>,
    /// Uncertainty of each score.
    pub standard_deviations: ArrayD<f64>,
    /// Mean absolute contribution of the term.
    pub importance: f64,
}

impl Term {
    /// Create a term with zero standard deviations and zero importance.
    pub fn new(features: Vec<usize>, scores: ArrayD<f64>) -> Self {
        let standard_deviations = ArrayD::zeros(scores.raw_dim());
        Self {
            features,
            scores,
            standard_deviations,
            importance: 0.0,
        }
    }

    /// Set the standard-deviation grid.
    pub fn with_standard_deviations(mut self, standard_deviations: ArrayD<f64>) -> Self {
        self.standard_deviations = standard_deviations;
        self
    }

    /// Set the importance.
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Returns true if the term spans more than one feature.
    pub fn is_interaction(&self) -> bool {
        self.features.len() > 1
    }

    /// Scores of the cell addressed by `bins` (one bucket per member feature).
    ///
    /// The result is 0-dimensional for single-score models and holds one value
    /// per class otherwise.
    pub(crate) fn lookup(&self, bins: &[usize]) -> ArrayViewD<'_, f64> {
        let mut view = self.scores.view();
        for &bin in bins {
            view = view.index_axis_move(Axis(0), bin);
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, arr3};

    #[test]
    fn lookup_pair_term() {
        let term = Term::new(vec![0, 1], arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn());
        assert!(term.is_interaction());
        let cell = term.lookup(&[2, 1]);
        assert_eq!(cell.ndim(), 0);
        assert_eq!(cell.iter().copied().collect::<Vec<_>>(), vec![6.0]);
        assert_eq!(term.standard_deviations.shape(), &[3, 2]);
    }

    #[test]
    fn lookup_with_class_axis() {
        let scores = arr3(&[[[0.1, 0.2, 0.3]], [[1.1, 1.2, 1.3]]]).into_dyn();
        let term = Term::new(vec![5], scores.index_axis(Axis(1), 0).to_owned());
        let cell = term.lookup(&[1]);
        assert_eq!(cell.iter().copied().collect::<Vec<_>>(), vec![1.1, 1.2, 1.3]);
    }
}
