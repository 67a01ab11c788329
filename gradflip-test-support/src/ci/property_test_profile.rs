//! Property-test run profile parsing for CI and local overrides.
//!
//! Every gradflip property suite reads its case count and fork mode through
//! [`ProptestRunProfile::load`], so one pair of environment variables tunes
//! them all.

use std::env;

/// Environment variable controlling proptest case counts.
pub const PROGTEST_CASES_ENV_KEY: &str = "PROGTEST_CASES";
/// Environment variable controlling proptest process forking.
pub const GRADFLIP_PBT_FORK_ENV_KEY: &str = "GRADFLIP_PBT_FORK";

/// Runtime profile for property-test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Load a profile from the environment, falling back to the given
    /// defaults for unset or malformed variables.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradflip_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(32, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self::from_overrides(
            default_cases,
            default_fork,
            env::var(PROGTEST_CASES_ENV_KEY).ok().as_deref(),
            env::var(GRADFLIP_PBT_FORK_ENV_KEY).ok().as_deref(),
        )
    }

    /// Resolve a profile from raw override strings.
    ///
    /// `None` keeps the default. Malformed overrides are logged at `warn`
    /// and also keep the default.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradflip_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::from_overrides(32, false, Some("8"), Some("on"));
    /// assert_eq!(profile.cases(), 8);
    /// assert!(profile.fork());
    /// ```
    #[must_use]
    pub fn from_overrides(
        default_cases: u32,
        default_fork: bool,
        cases: Option<&str>,
        fork: Option<&str>,
    ) -> Self {
        Self {
            cases: resolve(PROGTEST_CASES_ENV_KEY, cases, default_cases, parse_cases),
            fork: resolve(GRADFLIP_PBT_FORK_ENV_KEY, fork, default_fork, parse_bool),
        }
    }

    /// Number of cases to run per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether to run proptest cases in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

fn resolve<T: Copy>(
    key: &'static str,
    raw: Option<&str>,
    default: T,
    parser: fn(&str) -> Result<T, &'static str>,
) -> T {
    let Some(raw) = raw else {
        return default;
    };
    parser(raw).unwrap_or_else(|reason| {
        tracing::warn!(
            env = key,
            raw = %raw,
            reason,
            "ignoring malformed property-test override",
        );
        default
    })
}

fn parse_cases(raw: &str) -> Result<u32, &'static str> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err("cases must be positive"),
        Ok(cases) => Ok(cases),
        Err(_) => Err("cases must be an unsigned integer"),
    }
}

fn parse_bool(raw: &str) -> Result<bool, &'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected one of true/false/1/0/yes/no/on/off"),
    }
}
