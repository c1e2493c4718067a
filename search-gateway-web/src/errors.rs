//! Any errors that search-gateway-web might generate, and supporting implementations.

use std::error::Error;
use std::fmt;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use backtrace::Backtrace;
use search_gateway_upstream::{ForwardError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// The standard error for request handlers.
pub struct HandlerError {
    /// The wrapped error value.
    kind: HandlerErrorKind,
    /// The backtrace related to the wrapped error.
    pub(crate) backtrace: Backtrace,
}

/// An error that happened in a web handler.
#[derive(Error, Debug)]
pub enum HandlerErrorKind {
    /// A generic error, when there is nothing more specific to say.
    #[error("Internal error")]
    Internal,

    /// No route matched the request.
    #[error("Not Found")]
    NotFound,

    /// The path named a search endpoint that doesn't exist.
    #[error("Unknown search endpoint `{0}`")]
    UnknownEndpoint(String),

    /// The query parameters broke one of the endpoint's rules.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The upstream search API failed the request.
    #[error(transparent)]
    Upstream(#[from] ForwardError),
}

impl HandlerErrorKind {
    /// Convert the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Internal | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound | Self::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<HandlerErrorKind> for actix_web::Error {
    fn from(kind: HandlerErrorKind) -> Self {
        let error: HandlerError = kind.into();
        error.into()
    }
}

impl HandlerError {
    /// Access the wrapped error.
    pub fn kind(&self) -> &HandlerErrorKind {
        &self.kind
    }

    /// Get an `HandlerError` representing an `Internal` error.
    pub fn internal() -> Self {
        HandlerErrorKind::Internal.into()
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.kind.source()
    }
}

impl<T> From<T> for HandlerError
where
    HandlerErrorKind: From<T>,
{
    fn from(item: T) -> Self {
        HandlerError {
            kind: HandlerErrorKind::from(item),
            backtrace: Backtrace::new(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        // Name the debug struct after the kind, so error reports with
        // different causes aren't grouped together.
        fmt.debug_struct(&format!("HandlerError/{:?}", &self.kind))
            .field("kind", &self.kind)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

/// The body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// A message for the caller.
    detail: String,
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}
