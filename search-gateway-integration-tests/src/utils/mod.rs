//! Helpers shared by the tests.

pub mod metrics;
pub mod test_tools;
