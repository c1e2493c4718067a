//! Errors produced while validating and forwarding search requests.

use thiserror::Error;

/// Why a set of inbound parameters was rejected.
///
/// Each variant names the offending parameter, so the message can be shown
/// to the caller as is.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[allow(missing_docs, clippy::missing_docs_in_private_items)]
pub enum ValidationError {
    #[error("Missing required parameter `{0}`")]
    MissingRequiredParameter(&'static str),

    #[error("Parameter `{0}` must be an integer")]
    InvalidParameterType(&'static str),

    #[error("Parameter `{key}` must be between {min} and {max}")]
    ParameterOutOfRange {
        key: &'static str,
        min: i64,
        max: i64,
    },

    #[error("Parameter `{key}` must be one of: {}", .allowed.join(", "))]
    InvalidParameterValue {
        key: &'static str,
        allowed: &'static [&'static str],
    },
}

impl ValidationError {
    /// The parameter that failed validation.
    pub fn key(&self) -> &'static str {
        match self {
            Self::MissingRequiredParameter(key) | Self::InvalidParameterType(key) => key,
            Self::ParameterOutOfRange { key, .. } | Self::InvalidParameterValue { key, .. } => key,
        }
    }
}

/// Why the upstream did not produce a usable response.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The upstream answered with a non-success status.
    #[error("Upstream search API returned {status}: {body}")]
    UpstreamHttp {
        /// The HTTP status code returned.
        status: u16,
        /// The response body, or a description of why it couldn't be read.
        body: String,
    },

    /// The request could not be completed, or the response was unusable.
    #[error("Could not reach the upstream search API")]
    Transport(#[source] anyhow::Error),
}

/// Errors that may occur while building the catalog or the forwarder.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The endpoint tables break one of their invariants.
    #[error("Invalid endpoint catalog: {0}")]
    InvalidCatalog(String),

    /// The upstream settings can't be used.
    #[error("Invalid upstream configuration")]
    InvalidConfiguration(#[source] anyhow::Error),

    /// The HTTP client could not be constructed.
    #[error("Could not set up the upstream HTTP client")]
    Network(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::{ForwardError, ValidationError};
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_name_the_parameter() {
        assert_eq!(
            ValidationError::ParameterOutOfRange {
                key: "display",
                min: 1,
                max: 5
            }
            .to_string(),
            "Parameter `display` must be between 1 and 5"
        );
        assert_eq!(
            ValidationError::InvalidParameterValue {
                key: "sort",
                allowed: &["sim", "date"]
            }
            .to_string(),
            "Parameter `sort` must be one of: sim, date"
        );
        assert_eq!(ValidationError::InvalidParameterType("start").key(), "start");
    }

    #[test]
    fn upstream_errors_embed_status_and_body() {
        let error = ForwardError::UpstreamHttp {
            status: 403,
            body: r#"{"errorCode":"024"}"#.to_string(),
        };
        assert_eq!(
            error.to_string(),
            r#"Upstream search API returned 403: {"errorCode":"024"}"#
        );
    }
}
