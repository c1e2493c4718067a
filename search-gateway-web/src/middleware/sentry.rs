//! Middleware for reporting server errors to Sentry.

use crate::errors::HandlerError;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
};
use sentry::protocol::{Event, Exception, Level};
use std::{
    error::Error as StdError,
    fmt,
    future::{ready, Future, Ready},
    pin::Pin,
    task::{Context, Poll},
};

/// Reports handler errors that end in a server error to the current Sentry
/// hub. Does nothing if Sentry was not initialized.
#[derive(Debug, Default)]
pub struct Sentry;

impl<S> Transform<S, ServiceRequest> for Sentry
where
    S: Service<ServiceRequest, Response = ServiceResponse> + 'static,
    S::Future: 'static,
    S::Error: fmt::Debug,
{
    type Response = ServiceResponse;
    type Error = ActixError;
    type InitError = ();
    type Transform = SentryMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SentryMiddleware { service }))
    }
}

/// Middleware to catch errors from request handlers and send them to Sentry.
#[derive(Debug)]
pub struct SentryMiddleware<S> {
    /// The wrapped service
    service: S,
}

/// Build a Sentry event for `err`, with its backtrace and the chain of
/// sources. The outermost error comes last, as Sentry expects.
fn event_from_error(err: &HandlerError) -> Event<'static> {
    let mut top = exception_from_error(err);
    top.stacktrace =
        sentry::integrations::backtrace::parse_stacktrace(&format!("{:#?}", err.backtrace));

    let mut exceptions = vec![top];
    let mut source = err.source();
    while let Some(err) = source {
        exceptions.push(exception_from_error(err));
        source = err.source();
    }
    exceptions.reverse();

    Event {
        exception: exceptions.into(),
        level: Level::Error,
        ..Default::default()
    }
}

/// A Sentry exception describing a single error, without a stack trace.
fn exception_from_error<E: StdError + ?Sized>(err: &E) -> Exception {
    let dbg = format!("{:?}", err);
    Exception {
        ty: sentry::parse_type_from_debug(&dbg).to_owned(),
        value: Some(err.to_string()),
        ..Default::default()
    }
}

impl<S> Service<ServiceRequest> for SentryMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse>,
    S::Future: 'static,
    S::Error: fmt::Debug,
{
    type Response = ServiceResponse;
    type Error = ActixError;
    #[allow(clippy::type_complexity)]
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx).map_err(|error| {
            tracing::error!(?error, "Error polling service");
            HandlerError::internal().into()
        })
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let hub = sentry::Hub::current();
        let transaction = req.match_pattern();
        hub.configure_scope(|scope| {
            scope.set_transaction(transaction.as_deref());
        });

        let fut = self.service.call(req);

        Box::pin(async move {
            let response = fut.await.map_err(|error| {
                tracing::error!(?error, "handler error");
                HandlerError::internal()
            })?;

            if response.status().is_server_error() {
                if let Some(handler_error) = response
                    .response()
                    .error()
                    .and_then(|error| error.as_error::<HandlerError>())
                {
                    hub.capture_event(event_from_error(handler_error));
                }
            }

            Ok(response)
        })
    }
}
