//! Builder utilities for configuring fast-gradient structure attacks.
//!
//! Exposes the device and flip-policy selection surface and the validation
//! performed before constructing [`Fga`] instances.

use std::num::NonZeroUsize;

use crate::{Result, error::AttackError, fga::Fga, oracle::GradientOracle};

/// Compute device requested for the attack.
///
/// Only the CPU implementation ships with the crate. Requesting `Cuda`
/// fails at build time so callers never silently fall back.
///
/// # Examples
/// ```
/// use gradflip_core::Device;
///
/// assert_eq!(Device::default(), Device::Cpu);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Run on the host CPU.
    #[default]
    Cpu,
    /// Run on a CUDA device.
    Cuda,
}

/// How a selected flip is written into the adjacency.
///
/// `Accumulate` adds `1 - 2 * A[t][c]` to both mirrored cells, which toggles
/// binary entries but leaves `{0, 1}` when the input already holds other
/// values. Selecting the same column again in a later step reverts the
/// earlier flip.
///
/// # Examples
/// ```
/// use gradflip_core::FlipPolicy;
///
/// assert_eq!(FlipPolicy::default(), FlipPolicy::Accumulate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlipPolicy {
    /// Add the flip delta without clamping.
    #[default]
    Accumulate,
    /// Add the flip delta and clamp the result to `[0, 1]`.
    Clamp,
    /// Add the flip delta and exclude columns flipped earlier in the same
    /// attack from later selection.
    SkipFlipped,
}

impl FlipPolicy {
    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accumulate => "accumulate",
            Self::Clamp => "clamp",
            Self::SkipFlipped => "skip_flipped",
        }
    }
}

/// Configures and constructs [`Fga`] instances.
///
/// # Examples
/// ```
/// use gradflip_core::{DenseMatrix, FgaBuilder, FlipPolicy, LinearGcn};
///
/// let model = LinearGcn::new(DenseMatrix::identity(2))?;
/// let fga = FgaBuilder::new(model, 4)
///     .with_strict_binary(true)
///     .build()?;
/// assert_eq!(fga.node_count().get(), 4);
/// assert_eq!(fga.flip_policy(), FlipPolicy::Clamp);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FgaBuilder<O> {
    oracle: O,
    node_count: usize,
    feature_shape: Option<(usize, usize)>,
    attack_structure: bool,
    attack_features: bool,
    device: Device,
    flip_policy: FlipPolicy,
}

impl<O: GradientOracle> FgaBuilder<O> {
    /// Creates a builder for a graph with `node_count` nodes.
    ///
    /// Structure attacks are enabled and feature attacks disabled by default.
    #[must_use]
    pub fn new(oracle: O, node_count: usize) -> Self {
        Self {
            oracle,
            node_count,
            feature_shape: None,
            attack_structure: true,
            attack_features: false,
            device: Device::Cpu,
            flip_policy: FlipPolicy::Accumulate,
        }
    }

    /// Records the expected `(nodes, dimensions)` shape of the feature matrix.
    ///
    /// `attack` rejects feature matrices of any other shape.
    #[must_use]
    pub fn with_feature_shape(mut self, shape: (usize, usize)) -> Self {
        self.feature_shape = Some(shape);
        self
    }

    /// Enables or disables perturbation of the graph structure.
    #[must_use]
    pub fn with_attack_structure(mut self, enabled: bool) -> Self {
        self.attack_structure = enabled;
        self
    }

    /// Enables or disables perturbation of node features.
    ///
    /// Feature attacks are not supported; enabling them makes
    /// [`Self::build`] fail with [`AttackError::FeatureAttackUnsupported`].
    #[must_use]
    pub fn with_attack_features(mut self, enabled: bool) -> Self {
        self.attack_features = enabled;
        self
    }

    /// Selects the compute device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Selects how flips are written into the adjacency.
    #[must_use]
    pub fn with_flip_policy(mut self, policy: FlipPolicy) -> Self {
        self.flip_policy = policy;
        self
    }

    /// Shorthand for choosing between [`FlipPolicy::Clamp`] (`true`) and
    /// [`FlipPolicy::Accumulate`] (`false`).
    #[must_use]
    pub fn with_strict_binary(self, strict: bool) -> Self {
        self.with_flip_policy(if strict {
            FlipPolicy::Clamp
        } else {
            FlipPolicy::Accumulate
        })
    }

    /// Returns the configured node count.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the configured flip policy.
    #[must_use]
    pub const fn flip_policy(&self) -> FlipPolicy {
        self.flip_policy
    }

    /// Validates the configuration and constructs an [`Fga`] instance.
    ///
    /// # Errors
    /// Returns [`AttackError::FeatureAttackUnsupported`] when feature attacks
    /// were requested, [`AttackError::NothingToAttack`] when structure
    /// attacks were disabled, [`AttackError::ZeroNodes`] for an empty graph,
    /// [`AttackError::NodeCountMismatch`] when the feature shape disagrees
    /// with the node count, and [`AttackError::BackendUnavailable`] for
    /// devices this build cannot drive.
    pub fn build(self) -> Result<Fga<O>> {
        if self.attack_features {
            return Err(AttackError::FeatureAttackUnsupported);
        }
        if !self.attack_structure {
            return Err(AttackError::NothingToAttack);
        }
        let node_count = NonZeroUsize::new(self.node_count).ok_or(AttackError::ZeroNodes)?;
        if let Some((rows, _)) = self.feature_shape
            && rows != node_count.get()
        {
            return Err(AttackError::NodeCountMismatch {
                input: "feature shape",
                expected: node_count.get(),
                actual: rows,
            });
        }
        match self.device {
            Device::Cpu => {}
            Device::Cuda => {
                return Err(AttackError::BackendUnavailable {
                    requested: Device::Cuda,
                });
            }
        }
        Ok(Fga::new(
            self.oracle,
            node_count,
            self.feature_shape,
            self.flip_policy,
        ))
    }
}
