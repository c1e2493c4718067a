#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! An HTTP gateway in front of the Naver search API.
//!
//! The gateway is split into several subcrates that work in collaboration.
//!
//! - [search-gateway-settings](../search_gateway_settings/index.html)
//! - [search-gateway-upstream](../search_gateway_upstream/index.html)
//! - [search-gateway-web](../search_gateway_web/index.html)
//! - [search-gateway-integration-tests](../search_gateway_integration_tests/index.html)

mod sentry;

use anyhow::{Context, Result};
use cadence::{BufferedUdpMetricSink, QueuingMetricSink, StatsdClient};
use search_gateway_settings::{LogFormat, Settings};
use std::net::{TcpListener, UdpSocket};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Primary entry point
#[actix_rt::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Loading settings")?;
    init_logging(&settings).context("Initializing logging")?;
    let _sentry_guard = sentry::init_sentry(&settings).context("Initializing Sentry")?;
    let metrics_client = init_metrics(&settings).context("Initializing metrics")?;
    let listener = TcpListener::bind(settings.http.listen).context("Binding port")?;

    tracing::info!(
        r#type = "gateway.starting",
        env = %settings.env,
        listen = %settings.http.listen,
        "Starting search gateway"
    );

    search_gateway_web::run(listener, metrics_client, settings)
        .context("Starting search-gateway-web server")?
        .await
        .context("Running search-gateway-web server")?;

    Ok(())
}

/// Set up logging, based on settings and the `RUST_LOG` environment variable.
fn init_logging(settings: &Settings) -> Result<()> {
    LogTracer::init()?;
    let env_filter: EnvFilter = (&settings.logging.levels).into();
    let registry = Registry::default().with(env_filter);

    match settings.logging.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().pretty()),
        )?,
        LogFormat::Compact => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().compact()),
        )?,
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .flatten_event(true),
            ),
        )?,
    };

    Ok(())
}

/// Set up a statsd client that sends metrics over UDP without blocking
/// request handling.
fn init_metrics(settings: &Settings) -> Result<StatsdClient> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Binding metrics socket")?;
    socket.set_nonblocking(true)?;

    let host = (
        settings.metrics.sink_host.as_str(),
        settings.metrics.sink_port,
    );
    let udp_sink = BufferedUdpMetricSink::from(host, socket).context("Creating metrics sink")?;
    let queuing_sink =
        QueuingMetricSink::with_capacity(udp_sink, settings.metrics.max_queue_size_kb * 1024);

    Ok(StatsdClient::builder("search-gateway", queuing_sink)
        .with_error_handler(|error| {
            tracing::warn!(r#type = "gateway.metrics.error", %error, "Metrics error");
        })
        .build())
}
