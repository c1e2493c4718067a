//! Middlewares specific to the search gateway.

mod metrics;
mod sentry;

pub use self::metrics::Metrics;
pub use self::sentry::Sentry;
