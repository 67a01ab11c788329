//! Greedy edge-flip selection and symmetric application.
//!
//! The selector converts a relaxation gradient into a single discrete move:
//! flipping `A[t][c]` and `A[c][t]` for the column `c` whose flip is expected
//! to raise the loss the most.

use crate::{
    builder::FlipPolicy,
    error::MatrixError,
    matrix::DenseMatrix,
    report::FlipKind,
};

/// Column chosen by [`GreedySelector::select`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    /// Column of the target row to flip.
    pub column: usize,
    /// Sign-corrected gradient score of the flip.
    pub score: f32,
}

/// Picks and applies one flip per attack step.
///
/// # Examples
/// ```
/// use gradflip_core::{FlipPolicy, GreedySelector};
///
/// let selector = GreedySelector::new(FlipPolicy::Accumulate);
/// let row = [0.0, 1.0, 0.0, 1.0];
/// let gradient = [0.0, 5.0, -3.0, 1.0];
/// let selection = selector
///     .select(&row, &gradient, 0, |_| false)
///     .expect("three candidate columns exist");
/// assert_eq!(selection.column, 3);
/// assert_eq!(selection.score, -1.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GreedySelector {
    policy: FlipPolicy,
}

impl GreedySelector {
    /// Creates a selector writing flips according to `policy`.
    #[must_use]
    pub const fn new(policy: FlipPolicy) -> Self {
        Self { policy }
    }

    /// Returns the flip policy.
    #[must_use]
    pub const fn policy(&self) -> FlipPolicy {
        self.policy
    }

    /// Scores every column of `row` and returns the best flip.
    ///
    /// Each gradient entry is multiplied by `1 - 2 * row[c]`, so adding a
    /// missing edge keeps the gradient's sign and removing an existing edge
    /// negates it. Column `target` and every column for which `excluded`
    /// returns `true` are skipped. The first column attaining the maximum
    /// wins. Returns `None` when no column is eligible.
    pub fn select<F>(
        &self,
        row: &[f32],
        gradient: &[f32],
        target: usize,
        excluded: F,
    ) -> Option<Selection>
    where
        F: Fn(usize) -> bool,
    {
        row.iter()
            .zip(gradient)
            .enumerate()
            .filter(|&(column, _)| column != target && !excluded(column))
            .map(|(column, (&value, &grad))| Selection {
                column,
                score: grad * flip_delta(value),
            })
            .fold(None, |best: Option<Selection>, candidate| match best {
                Some(current) if current.score >= candidate.score => Some(current),
                _ => Some(candidate),
            })
    }

    /// Flips (`target`, `column`) and its mirror in `adjacency`.
    ///
    /// Both cells receive the same delta, computed once from the
    /// pre-flip value of `A[target][column]`, so a symmetric matrix stays
    /// symmetric.
    ///
    /// # Errors
    /// Returns [`MatrixError::OutOfBounds`] when either coordinate is invalid.
    pub fn apply(
        &self,
        adjacency: &mut DenseMatrix,
        target: usize,
        column: usize,
    ) -> Result<FlipKind, MatrixError> {
        let (rows, cols) = (adjacency.rows(), adjacency.cols());
        let out_of_bounds = |row, col| MatrixError::OutOfBounds {
            row,
            col,
            rows,
            cols,
        };
        let current = adjacency
            .get(target, column)
            .ok_or_else(|| out_of_bounds(target, column))?;
        if adjacency.get(column, target).is_none() {
            return Err(out_of_bounds(column, target));
        }
        let delta = flip_delta(current);
        let clamp = matches!(self.policy, FlipPolicy::Clamp);
        for (row, col) in [(target, column), (column, target)] {
            if let Some(cell) = adjacency.get_mut(row, col) {
                *cell += delta;
                if clamp {
                    *cell = cell.clamp(0.0, 1.0);
                }
            }
        }
        Ok(FlipKind::from_previous(current))
    }
}

/// `1 - 2 * value`: `+1` for a missing edge and `-1` for a present one.
fn flip_delta(value: f32) -> f32 {
    1.0 - 2.0 * value
}

/// Per-call bookkeeping for a running attack.
///
/// Created fresh by every `attack` call so the relaxation vector always
/// starts at zero. Flips are folded into the adjacency immediately, so the
/// relaxation is never updated.
#[derive(Debug)]
pub(crate) struct PerturbationState {
    relaxation: Vec<f32>,
    flip_counts: Vec<usize>,
    remaining: usize,
}

impl PerturbationState {
    pub(crate) fn new(nodes: usize, budget: usize) -> Self {
        Self {
            relaxation: vec![0.0; nodes],
            flip_counts: vec![0; nodes],
            remaining: budget,
        }
    }

    pub(crate) fn relaxation(&self) -> &[f32] {
        &self.relaxation
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn was_flipped(&self, column: usize) -> bool {
        self.flip_counts.get(column).is_some_and(|&count| count > 0)
    }

    /// Records a flip of `column`, spending one unit of budget. Returns `true`
    /// when the column had already been flipped an odd number of times, i.e.
    /// the new flip reverts an earlier one.
    pub(crate) fn record_flip(&mut self, column: usize) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        match self.flip_counts.get_mut(column) {
            Some(count) => {
                let reverts = *count % 2 == 1;
                *count += 1;
                reverts
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ring() -> DenseMatrix {
        DenseMatrix::from_rows(&[
            vec![0.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0],
        ])
        .expect("rectangular rows")
    }

    #[test]
    fn select_excludes_target_even_when_its_score_is_highest() {
        let selector = GreedySelector::new(FlipPolicy::Accumulate);
        let row = [0.0, 1.0, 0.0, 1.0];
        let gradient = [0.0, 5.0, -3.0, 1.0];
        let selection = selector
            .select(&row, &gradient, 0, |_| false)
            .expect("candidates exist");
        assert_eq!(
            selection,
            Selection {
                column: 3,
                score: -1.0,
            }
        );
    }

    #[rstest]
    #[case::first_of_equal_scores(&[0.0, 0.0, 0.0], &[0.0, 2.0, 2.0], 1)]
    #[case::removal_beats_addition(&[0.0, 1.0, 0.0], &[0.0, -4.0, 3.0], 1)]
    #[case::addition_beats_removal(&[0.0, 1.0, 0.0], &[0.0, 4.0, 3.0], 2)]
    fn select_scores_sign_corrected_gradient(
        #[case] row: &[f32],
        #[case] gradient: &[f32],
        #[case] expected: usize,
    ) {
        let selector = GreedySelector::new(FlipPolicy::Accumulate);
        let selection = selector
            .select(row, gradient, 0, |_| false)
            .expect("candidates exist");
        assert_eq!(selection.column, expected);
    }

    #[test]
    fn select_honours_exclusions() {
        let selector = GreedySelector::new(FlipPolicy::SkipFlipped);
        let row = [0.0, 0.0, 0.0];
        let gradient = [0.0, 9.0, 1.0];
        let selection = selector
            .select(&row, &gradient, 0, |column| column == 1)
            .expect("column 2 remains");
        assert_eq!(selection.column, 2);
        assert_eq!(selector.select(&row, &gradient, 0, |_| true), None);
    }

    #[test]
    fn select_returns_none_for_single_node() {
        let selector = GreedySelector::new(FlipPolicy::Accumulate);
        assert_eq!(selector.select(&[0.0], &[1.0], 0, |_| false), None);
    }

    #[test]
    fn apply_mirrors_additions_and_removals() {
        let selector = GreedySelector::new(FlipPolicy::Accumulate);
        let mut adjacency = ring();

        let added = selector.apply(&mut adjacency, 0, 2).expect("in bounds");
        assert_eq!(added, FlipKind::Added);
        assert_eq!(adjacency.get(0, 2), Some(1.0));
        assert_eq!(adjacency.get(2, 0), Some(1.0));

        let removed = selector.apply(&mut adjacency, 0, 1).expect("in bounds");
        assert_eq!(removed, FlipKind::Removed);
        assert_eq!(adjacency.get(0, 1), Some(0.0));
        assert_eq!(adjacency.get(1, 0), Some(0.0));
    }

    #[rstest]
    #[case::accumulate(FlipPolicy::Accumulate, 2.0, -1.0)]
    #[case::clamp(FlipPolicy::Clamp, 2.0, 0.0)]
    fn apply_handles_weighted_entries_per_policy(
        #[case] policy: FlipPolicy,
        #[case] weight: f32,
        #[case] expected: f32,
    ) {
        let selector = GreedySelector::new(policy);
        let mut adjacency =
            DenseMatrix::from_rows(&[vec![0.0, weight], vec![weight, 0.0]]).expect("rows");
        selector.apply(&mut adjacency, 0, 1).expect("in bounds");
        assert_eq!(adjacency.get(0, 1), Some(expected));
        assert_eq!(adjacency.get(1, 0), Some(expected));
    }

    #[test]
    fn apply_rejects_out_of_bounds_column() {
        let selector = GreedySelector::new(FlipPolicy::Accumulate);
        let mut adjacency = ring();
        let err = selector.apply(&mut adjacency, 0, 4).expect_err("column 4 is invalid");
        assert!(matches!(err, MatrixError::OutOfBounds { col: 4, .. }));
        assert_eq!(adjacency, ring());
    }

    #[test]
    fn state_tracks_reverting_flips() {
        let mut state = PerturbationState::new(3, 3);
        assert!(state.relaxation().iter().all(|&value| value == 0.0));
        assert!(!state.record_flip(1));
        assert!(state.was_flipped(1));
        assert!(state.record_flip(1));
        assert!(!state.record_flip(1));
        assert_eq!(state.remaining(), 0);
    }
}
