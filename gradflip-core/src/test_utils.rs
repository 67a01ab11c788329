//! Shared test utilities for `gradflip-core`.

use gradflip_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

use crate::{
    error::OracleError,
    oracle::{GradientOracle, GradientQuery},
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROGTEST_CASES` and
/// `GRADFLIP_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// [`GradientOracle`] returning a fixed gradient and counting invocations.
///
/// Queries whose node count differs from the stored gradient fail with
/// [`OracleError::DimensionMismatch`].
#[derive(Clone, Debug)]
pub(crate) struct CountingOracle {
    gradient: Vec<f32>,
    calls: Arc<AtomicUsize>,
    name: &'static str,
}

impl CountingOracle {
    /// Creates a counting oracle with the default "counting" name.
    #[must_use]
    pub(crate) fn new(gradient: Vec<f32>) -> Self {
        Self::with_name("counting", gradient)
    }

    /// Creates a counting oracle with a specific display name.
    #[must_use]
    pub(crate) fn with_name(name: &'static str, gradient: Vec<f32>) -> Self {
        Self {
            gradient,
            calls: Arc::new(AtomicUsize::new(0)),
            name,
        }
    }

    /// Returns the number of gradient evaluations so far.
    #[must_use]
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl GradientOracle for CountingOracle {
    fn name(&self) -> &str {
        self.name
    }

    fn relaxation_gradient(&self, query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if query.nodes() != self.gradient.len() {
            return Err(OracleError::DimensionMismatch {
                input: "adjacency",
                axis: "rows",
                expected: self.gradient.len(),
                actual: query.nodes(),
            });
        }
        Ok(self.gradient.clone())
    }
}
