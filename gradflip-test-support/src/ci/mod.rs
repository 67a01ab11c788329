//! Helpers shared by CI-tuned test suites.

pub mod property_test_profile;
