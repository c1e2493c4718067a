#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! Validation and forwarding of search requests.
//!
//! Every search endpoint is described by an [`EndpointSpec`]: the upstream
//! resource it maps to and an ordered list of [`ParameterRule`]s. The six
//! endpoints the gateway serves are built once with
//! [`EndpointCatalog::naver`].
//!
//! A request goes through two steps:
//!
//! 1. [`validate`] checks the raw query parameters against the endpoint's
//!    rules and produces a [`CanonicalRequest`] with defaults filled in, or
//!    the first [`ValidationError`] found.
//! 2. [`Forwarder::forward`] sends the canonical parameters to the upstream
//!    in a single GET request and classifies what came back as an
//!    [`UpstreamOutcome`].
//!
//! ```
//! use search_gateway_upstream::{validate, EndpointCatalog, ParameterValue};
//! use std::collections::HashMap;
//!
//! let catalog = EndpointCatalog::naver().expect("valid catalog");
//! let news = catalog.get("news").unwrap();
//!
//! let mut raw = HashMap::new();
//! raw.insert("query".to_string(), "ai".to_string());
//!
//! let request = validate(news, &raw).unwrap();
//! assert_eq!(request.get("display"), Some(&ParameterValue::Integer(10)));
//! ```

mod endpoints;
mod error;
mod forward;
mod rules;
mod validate;

pub use crate::endpoints::EndpointCatalog;
pub use crate::error::{ForwardError, SetupError, ValidationError};
pub use crate::forward::{Forwarder, UpstreamOutcome, CLIENT_ID_HEADER, CLIENT_SECRET_HEADER};
pub use crate::rules::{EndpointSpec, ParameterKind, ParameterRule, ParameterValue};
pub use crate::validate::{validate, CanonicalRequest};
