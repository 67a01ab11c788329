//! Error types for the gradflip core library.
//!
//! Defines error enums exposed by the public API, their stable codes, and a
//! convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::builder::Device;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced while building or combining dense and sparse matrices.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MatrixError {
    /// Backing storage length did not equal `rows * cols`.
    #[error("matrix of shape {rows}x{cols} needs {expected} values but {actual} were given")]
    StorageLength {
        /// Requested row count.
        rows: usize,
        /// Requested column count.
        cols: usize,
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// Nested rows did not all have the same length.
    #[error("row {row} has {actual} values but the first row has {expected}")]
    RaggedRow {
        /// Index of the first row whose length differs.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        actual: usize,
    },
    /// Inner dimensions of a product did not agree.
    #[error("cannot multiply {left_rows}x{left_cols} by {right_rows}x{right_cols}")]
    ProductMismatch {
        /// Rows of the left operand.
        left_rows: usize,
        /// Columns of the left operand.
        left_cols: usize,
        /// Rows of the right operand.
        right_rows: usize,
        /// Columns of the right operand.
        right_cols: usize,
    },
    /// A square matrix was required.
    #[error("matrix must be square (got {rows}x{cols})")]
    NotSquare {
        /// Row count of the offending matrix.
        rows: usize,
        /// Column count of the offending matrix.
        cols: usize,
    },
    /// An entry was NaN or infinite.
    #[error("entry ({row}, {col}) is not finite")]
    NonFinite {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
    },
    /// A coordinate was outside the matrix bounds.
    #[error("coordinate ({row}, {col}) lies outside a {rows}x{cols} matrix")]
    OutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Row count of the matrix.
        rows: usize,
        /// Column count of the matrix.
        cols: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`MatrixError`] variants.
    enum MatrixErrorCode for MatrixError {
        /// Backing storage length did not equal `rows * cols`.
        StorageLength => StorageLength { .. } => "MATRIX_STORAGE_LENGTH",
        /// Nested rows did not all have the same length.
        RaggedRow => RaggedRow { .. } => "MATRIX_RAGGED_ROW",
        /// Inner dimensions of a product did not agree.
        ProductMismatch => ProductMismatch { .. } => "MATRIX_PRODUCT_MISMATCH",
        /// A square matrix was required.
        NotSquare => NotSquare { .. } => "MATRIX_NOT_SQUARE",
        /// An entry was NaN or infinite.
        NonFinite => NonFinite { .. } => "MATRIX_NON_FINITE",
        /// A coordinate was outside the matrix bounds.
        OutOfBounds => OutOfBounds { .. } => "MATRIX_OUT_OF_BOUNDS",
    }
}

/// An error produced by a [`crate::GradientOracle`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum OracleError {
    /// An input did not have the shape the model expects.
    #[error("{input} has {actual} {axis} but the model expects {expected}")]
    DimensionMismatch {
        /// Name of the offending input.
        input: &'static str,
        /// Axis being compared (`rows`, `columns`, `entries`).
        axis: &'static str,
        /// Size required by the model.
        expected: usize,
        /// Size supplied by the caller.
        actual: usize,
    },
    /// The loss is undefined without training nodes.
    #[error("training index set is empty")]
    EmptyTrainingSet,
    /// A node index exceeded the graph size.
    #[error("node index {index} is out of bounds for {nodes} nodes")]
    NodeOutOfBounds {
        /// Offending node index.
        index: usize,
        /// Number of nodes in the graph.
        nodes: usize,
    },
    /// A label referenced a class the model does not produce.
    #[error("node {node} has label {label} but the model has {classes} classes")]
    LabelOutOfRange {
        /// Node carrying the label.
        node: usize,
        /// Offending class id.
        label: usize,
        /// Number of classes the model scores.
        classes: usize,
    },
    /// The forward pass produced a NaN or infinite loss.
    #[error("loss evaluated to a non-finite value")]
    NonFiniteLoss,
    /// An external model implementation failed.
    #[error("model evaluation failed: {reason}")]
    Evaluation {
        /// Human-readable failure description from the model.
        reason: Arc<str>,
    },
}

define_error_codes! {
    /// Stable codes describing [`OracleError`] variants.
    enum OracleErrorCode for OracleError {
        /// An input did not have the shape the model expects.
        DimensionMismatch => DimensionMismatch { .. } => "ORACLE_DIMENSION_MISMATCH",
        /// The loss is undefined without training nodes.
        EmptyTrainingSet => EmptyTrainingSet => "ORACLE_EMPTY_TRAINING_SET",
        /// A node index exceeded the graph size.
        NodeOutOfBounds => NodeOutOfBounds { .. } => "ORACLE_NODE_OUT_OF_BOUNDS",
        /// A label referenced a class the model does not produce.
        LabelOutOfRange => LabelOutOfRange { .. } => "ORACLE_LABEL_OUT_OF_RANGE",
        /// The forward pass produced a NaN or infinite loss.
        NonFiniteLoss => NonFiniteLoss => "ORACLE_NON_FINITE_LOSS",
        /// An external model implementation failed.
        Evaluation => Evaluation { .. } => "ORACLE_EVALUATION",
    }
}

/// A structural defect found when validating an adjacency matrix.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AdjacencyViolation {
    /// The matrix is not square.
    #[error("adjacency must be square (got {rows}x{cols})")]
    NotSquare {
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },
    /// `A[row][col]` differs from `A[col][row]`.
    #[error("adjacency is not symmetric at ({row}, {col})")]
    Asymmetric {
        /// Row of the first mismatching cell.
        row: usize,
        /// Column of the first mismatching cell.
        col: usize,
    },
    /// A stored entry was something other than `1`.
    #[error("adjacency entry ({row}, {col}) is {value}; edges must have weight 1")]
    NonBinary {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
        /// The stored value.
        value: f32,
    },
    /// A node is connected to itself.
    #[error("node {node} has a self-loop")]
    SelfLoop {
        /// The node carrying the self-loop.
        node: usize,
    },
}

define_error_codes! {
    /// Stable codes describing [`AdjacencyViolation`] variants.
    enum AdjacencyViolationCode for AdjacencyViolation {
        /// The matrix is not square.
        NotSquare => NotSquare { .. } => "ADJACENCY_NOT_SQUARE",
        /// `A[row][col]` differs from `A[col][row]`.
        Asymmetric => Asymmetric { .. } => "ADJACENCY_ASYMMETRIC",
        /// A stored entry was something other than `1`.
        NonBinary => NonBinary { .. } => "ADJACENCY_NON_BINARY",
        /// A node is connected to itself.
        SelfLoop => SelfLoop { .. } => "ADJACENCY_SELF_LOOP",
    }
}

/// Broad category of an [`AttackError`].
///
/// Callers that only need to distinguish misconfiguration from bad input or
/// corrupted output can match on this instead of individual variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttackErrorKind {
    /// The attack was configured with an unsupported combination of options.
    Configuration,
    /// The requested device is not available in this build.
    BackendUnavailable,
    /// The inputs handed to `attack` were malformed.
    InvalidInput,
    /// The gradient oracle failed or returned an unusable gradient.
    Oracle,
    /// The perturbed adjacency failed post-attack validation.
    DataIntegrity,
}

/// Error type produced when constructing or running [`crate::Fga`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AttackError {
    /// Perturbing node features is not supported.
    #[error("feature attack not supported")]
    FeatureAttackUnsupported,
    /// Both structure and feature attacks were disabled.
    #[error("attack must perturb the graph structure")]
    NothingToAttack,
    /// The attack was configured for an empty graph.
    #[error("node_count must be at least 1 (got 0)")]
    ZeroNodes,
    /// The requested device is unavailable in the current build.
    #[error("the requested device {requested:?} is not available in this build")]
    BackendUnavailable {
        /// Device that could not be satisfied by the current build.
        requested: Device,
    },
    /// The loss cannot be evaluated without training nodes.
    #[error("training index set is empty")]
    EmptyTrainingSet,
    /// An input's size did not match the configured node count.
    #[error("{input} covers {actual} nodes but the attack was configured for {expected}")]
    NodeCountMismatch {
        /// Name of the offending input.
        input: &'static str,
        /// Node count the attack was built with.
        expected: usize,
        /// Node count implied by the input.
        actual: usize,
    },
    /// The feature matrix width did not match the configured feature shape.
    #[error("features have {actual} dimensions but the attack was configured for {expected}")]
    FeatureDimensionMismatch {
        /// Dimension count from the configured feature shape.
        expected: usize,
        /// Dimension count of the supplied feature matrix.
        actual: usize,
    },
    /// The target node index exceeded the graph size.
    #[error("target node {target} is out of bounds for {nodes} nodes")]
    TargetOutOfBounds {
        /// Requested target node.
        target: usize,
        /// Number of nodes in the graph.
        nodes: usize,
    },
    /// A training index exceeded the graph size.
    #[error("training index {index} is out of bounds for {nodes} nodes")]
    TrainIndexOutOfBounds {
        /// Offending training index.
        index: usize,
        /// Number of nodes in the graph.
        nodes: usize,
    },
    /// The budget cannot be met without re-selecting flipped columns.
    #[error("{requested} perturbations requested but only {available} distinct columns exist")]
    BudgetExceedsCandidates {
        /// Requested number of perturbations.
        requested: usize,
        /// Number of distinct columns that can be flipped.
        available: usize,
    },
    /// An input matrix was malformed.
    #[error("invalid {input}: {error}")]
    Matrix {
        /// Name of the offending input.
        input: &'static str,
        #[source]
        /// Underlying matrix error.
        error: MatrixError,
    },
    /// The gradient oracle failed.
    #[error("gradient oracle `{oracle}` failed: {error}")]
    Oracle {
        /// Identifier for the oracle that produced the error.
        oracle: Arc<str>,
        #[source]
        /// Underlying oracle error.
        error: OracleError,
    },
    /// The oracle returned a gradient of the wrong length.
    #[error("gradient has {actual} entries but the graph has {expected} nodes")]
    GradientLength {
        /// Number of nodes in the graph.
        expected: usize,
        /// Number of gradient entries returned.
        actual: usize,
    },
    /// The oracle returned a NaN or infinite gradient entry.
    #[error("gradient entry {column} is not finite at step {step}")]
    NonFiniteGradient {
        /// Zero-based perturbation step.
        step: usize,
        /// Offending column.
        column: usize,
    },
    /// The perturbed adjacency failed validation.
    #[error("modified adjacency is invalid: {violation}")]
    InvalidAdjacency {
        #[source]
        /// The first violation found.
        violation: AdjacencyViolation,
    },
}

define_error_codes! {
    /// Stable codes describing [`AttackError`] variants.
    enum AttackErrorCode for AttackError {
        /// Perturbing node features is not supported.
        FeatureAttackUnsupported => FeatureAttackUnsupported => "ATTACK_FEATURE_UNSUPPORTED",
        /// Both structure and feature attacks were disabled.
        NothingToAttack => NothingToAttack => "ATTACK_NOTHING_TO_ATTACK",
        /// The attack was configured for an empty graph.
        ZeroNodes => ZeroNodes => "ATTACK_ZERO_NODES",
        /// The requested device is unavailable in the current build.
        BackendUnavailable => BackendUnavailable { .. } => "ATTACK_BACKEND_UNAVAILABLE",
        /// The loss cannot be evaluated without training nodes.
        EmptyTrainingSet => EmptyTrainingSet => "ATTACK_EMPTY_TRAINING_SET",
        /// An input's size did not match the configured node count.
        NodeCountMismatch => NodeCountMismatch { .. } => "ATTACK_NODE_COUNT_MISMATCH",
        /// The feature matrix width did not match the configured feature shape.
        FeatureDimensionMismatch => FeatureDimensionMismatch { .. } => "ATTACK_FEATURE_DIMENSION_MISMATCH",
        /// The target node index exceeded the graph size.
        TargetOutOfBounds => TargetOutOfBounds { .. } => "ATTACK_TARGET_OUT_OF_BOUNDS",
        /// A training index exceeded the graph size.
        TrainIndexOutOfBounds => TrainIndexOutOfBounds { .. } => "ATTACK_TRAIN_INDEX_OUT_OF_BOUNDS",
        /// The budget cannot be met without re-selecting flipped columns.
        BudgetExceedsCandidates => BudgetExceedsCandidates { .. } => "ATTACK_BUDGET_EXCEEDS_CANDIDATES",
        /// An input matrix was malformed.
        Matrix => Matrix { .. } => "ATTACK_INVALID_MATRIX",
        /// The gradient oracle failed.
        OracleFailure => Oracle { .. } => "ATTACK_ORACLE_FAILURE",
        /// The oracle returned a gradient of the wrong length.
        GradientLength => GradientLength { .. } => "ATTACK_GRADIENT_LENGTH",
        /// The oracle returned a NaN or infinite gradient entry.
        NonFiniteGradient => NonFiniteGradient { .. } => "ATTACK_NON_FINITE_GRADIENT",
        /// The perturbed adjacency failed validation.
        InvalidAdjacency => InvalidAdjacency { .. } => "ATTACK_INVALID_ADJACENCY",
    }
}

impl AttackError {
    /// Returns the broad category of this error.
    #[must_use]
    pub const fn kind(&self) -> AttackErrorKind {
        match self {
            Self::FeatureAttackUnsupported | Self::NothingToAttack | Self::ZeroNodes => {
                AttackErrorKind::Configuration
            }
            Self::BackendUnavailable { .. } => AttackErrorKind::BackendUnavailable,
            Self::EmptyTrainingSet
            | Self::NodeCountMismatch { .. }
            | Self::FeatureDimensionMismatch { .. }
            | Self::TargetOutOfBounds { .. }
            | Self::TrainIndexOutOfBounds { .. }
            | Self::BudgetExceedsCandidates { .. }
            | Self::Matrix { .. } => AttackErrorKind::InvalidInput,
            Self::Oracle { .. } | Self::GradientLength { .. } | Self::NonFiniteGradient { .. } => {
                AttackErrorKind::Oracle
            }
            Self::InvalidAdjacency { .. } => AttackErrorKind::DataIntegrity,
        }
    }

    /// Retrieve the inner [`OracleErrorCode`] when the error originated in a
    /// [`crate::GradientOracle`].
    #[must_use]
    pub const fn oracle_code(&self) -> Option<OracleErrorCode> {
        match self {
            Self::Oracle { error, .. } => Some(error.code()),
            _ => None,
        }
    }

    /// Retrieve the inner [`AdjacencyViolationCode`] when post-attack
    /// validation failed.
    #[must_use]
    pub const fn violation_code(&self) -> Option<AdjacencyViolationCode> {
        match self {
            Self::InvalidAdjacency { violation } => Some(violation.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, AttackError>;
