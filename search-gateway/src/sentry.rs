//! Sentry error reporting.

use anyhow::Result;
use search_gateway_settings::Settings;
use sentry::IntoDsn;
use std::sync::Arc;

/// Sets up Sentry. Reporting is disabled if no DSN is configured.
///
/// The returned guard must be held for the duration of the program. Once it is
/// dropped, no more errors will be reported.
pub fn init_sentry(settings: &Settings) -> Result<sentry::ClientInitGuard> {
    let mut options = sentry::ClientOptions {
        dsn: settings.sentry.dsn.as_deref().into_dsn()?,
        debug: settings.sentry.debug,
        release: sentry::release_name!(),
        environment: Some(settings.env.clone().into()),
        ..Default::default()
    };

    if settings.sentry.debug {
        options.before_send = Some(Arc::new(|event: sentry::protocol::Event<'static>| {
            let exceptions: Vec<_> = event
                .exception
                .values
                .iter()
                .map(|exc| format!("{}: {}", exc.ty, exc.value.as_deref().unwrap_or("--")))
                .collect();
            tracing::debug!(
                r#type = "gateway.sentry.event",
                event_id = %event.event_id,
                ?exceptions,
                "A sentry error was sent"
            );
            Some(event)
        }));
    }

    let guard = sentry::init(options);
    if guard.is_enabled() {
        tracing::info!(r#type = "gateway.sentry.enabled", "Reporting errors to Sentry");
    }
    Ok(guard)
}
