//! Result types describing the flips applied by an attack.

/// Direction of a single flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlipKind {
    /// A missing edge was inserted.
    Added,
    /// An existing edge was removed.
    Removed,
}

impl FlipKind {
    /// Classifies a flip by the cell value it started from.
    ///
    /// Values below one half count as a missing edge.
    ///
    /// # Examples
    /// ```
    /// use gradflip_core::FlipKind;
    ///
    /// assert_eq!(FlipKind::from_previous(0.0), FlipKind::Added);
    /// assert_eq!(FlipKind::from_previous(1.0), FlipKind::Removed);
    /// ```
    #[must_use]
    pub fn from_previous(value: f32) -> Self {
        if value < 0.5 { Self::Added } else { Self::Removed }
    }

    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

/// One flip applied to the target row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeFlip {
    /// Zero-based attack step that produced the flip.
    pub step: usize,
    /// Column of the target row that was flipped.
    pub column: usize,
    /// Whether the flip added or removed an edge.
    pub kind: FlipKind,
    /// Sign-corrected gradient score that won the selection.
    pub score: f32,
    /// Whether the flip undid an earlier flip of the same column.
    pub reverted: bool,
}

/// Summary of a completed attack.
///
/// # Examples
/// ```
/// use gradflip_core::{AttackReport, EdgeFlip, FlipKind};
///
/// let report = AttackReport::new(
///     0,
///     vec![EdgeFlip { step: 0, column: 2, kind: FlipKind::Added, score: 0.4, reverted: false }],
/// );
/// assert_eq!(report.target(), 0);
/// assert_eq!(report.net_flips(), vec![(2, FlipKind::Added)]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AttackReport {
    target: usize,
    flips: Vec<EdgeFlip>,
}

impl AttackReport {
    /// Builds a report from flips in step order.
    #[must_use]
    pub fn new(target: usize, flips: Vec<EdgeFlip>) -> Self {
        Self { target, flips }
    }

    /// Node whose row was attacked.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Every flip in step order, including reverting ones.
    #[must_use]
    pub fn flips(&self) -> &[EdgeFlip] {
        &self.flips
    }

    /// Number of flips that undid an earlier flip.
    #[must_use]
    pub fn reverted_count(&self) -> usize {
        self.flips.iter().filter(|flip| flip.reverted).count()
    }

    /// Columns whose final state differs from the input, sorted by column,
    /// with the kind of their first flip.
    #[must_use]
    pub fn net_flips(&self) -> Vec<(usize, FlipKind)> {
        let mut columns: Vec<(usize, FlipKind, usize)> = Vec::new();
        for flip in &self.flips {
            match columns.iter_mut().find(|(column, _, _)| *column == flip.column) {
                Some((_, _, count)) => *count += 1,
                None => columns.push((flip.column, flip.kind, 1)),
            }
        }
        columns.sort_unstable_by_key(|&(column, _, _)| column);
        columns
            .into_iter()
            .filter(|&(_, _, count)| count % 2 == 1)
            .map(|(column, kind, _)| (column, kind))
            .collect()
    }
}
