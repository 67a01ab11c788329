//! Stable diagnostic codes carried by a failed command.

use gradflip_core::{AdjacencyViolationCode, AttackErrorCode, AttackErrorKind, OracleErrorCode};

use super::{CliError, SyntheticError};

/// Machine-readable codes describing why a command failed.
///
/// Every field is `None` when the failure did not pass through the layer
/// that owns the code.
///
/// # Examples
/// ```
/// use gradflip_cli::cli::{CliError, FailureCodes};
/// use gradflip_core::{AttackError, AttackErrorCode};
///
/// let codes = FailureCodes::from_cli_error(&CliError::Core(AttackError::EmptyTrainingSet));
/// assert_eq!(codes.attack, Some(AttackErrorCode::EmptyTrainingSet));
/// assert_eq!(codes.oracle, None);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FailureCodes {
    /// Code of the attack error, if the attack itself failed.
    pub attack: Option<AttackErrorCode>,
    /// Broad category of the attack error.
    pub kind: Option<AttackErrorKind>,
    /// Code of the surrogate error, whether raised during the attack, while
    /// generating the scenario, or while scoring the perturbed graph.
    pub oracle: Option<OracleErrorCode>,
    /// Code of the first violation when the perturbed graph was rejected.
    pub violation: Option<AdjacencyViolationCode>,
}

impl FailureCodes {
    /// Extracts the codes from a command error.
    #[must_use]
    pub fn from_cli_error(error: &CliError) -> Self {
        match error {
            CliError::Core(core) => Self {
                attack: Some(core.code()),
                kind: Some(core.kind()),
                oracle: core.oracle_code(),
                violation: core.violation_code(),
            },
            CliError::Evaluation(oracle) | CliError::Synthetic(SyntheticError::Oracle(oracle)) => {
                Self {
                    oracle: Some(oracle.code()),
                    ..Self::default()
                }
            }
            CliError::Synthetic(_) | CliError::MissingResult => Self::default(),
        }
    }

    /// Extracts the codes from a top-level error chain, looking through
    /// `anyhow` context for a [`CliError`].
    #[must_use]
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        error
            .downcast_ref::<CliError>()
            .map(Self::from_cli_error)
            .unwrap_or_default()
    }
}
