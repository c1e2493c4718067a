#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! Web server for the search gateway's public API.

mod dockerflow;
mod errors;
mod logging;
mod middleware;
mod search;
mod well_known;

pub use crate::errors::{HandlerError, HandlerErrorKind};

use actix_cors::Cors;
use actix_web::{
    dev::Server,
    get,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use anyhow::{Context, Result};
use cadence::StatsdClient;
use search_gateway_settings::Settings;
use search_gateway_upstream::{EndpointCatalog, Forwarder};
use serde_json::json;
use std::{net::TcpListener, path::Path};
use tracing_actix_web::TracingLogger;

use crate::logging::GatewayRootSpanBuilder;

/// Run the web server
///
/// The returned server is a `Future` that must either be `.await`ed, or run it
/// as a background task using `tokio::spawn`.
///
/// Most of the details from `settings` will be respected, except for those that
/// go into building the listener (the host and port). If you want to respect the
/// settings specified in that object, you must include them in the construction
/// of `listener`.
///
/// The endpoint catalog and the upstream forwarder are built here, once, and
/// shared by every worker.
///
/// # Errors
///
/// Returns an error if the catalog or the forwarder can't be built, or if
/// the server cannot be started on the provided listener.
///
/// # Examples
///
/// Run the server in the foreground. This will only return if there is an error
/// that causes the server to shut down.
///
/// ```no_run
/// # actix_rt::System::new().block_on(async {
/// let listener = std::net::TcpListener::bind("127.0.0.1:8080")
///     .expect("Failed to bind port");
/// let settings = search_gateway_settings::Settings::load()
///     .expect("Failed to load settings");
/// let metrics_client = cadence::StatsdClient::from_sink("search-gateway", cadence::NopMetricSink);
/// search_gateway_web::run(listener, metrics_client, settings)
///     .expect("Failed to start server")
///     .await
///     .expect("Fatal error while running server");
/// # })
/// ```
pub fn run(
    listener: TcpListener,
    metrics_client: StatsdClient,
    settings: Settings,
) -> Result<Server> {
    let catalog = Data::new(EndpointCatalog::naver().context("Building endpoint catalog")?);
    let forwarder =
        Data::new(Forwarder::new(&settings.upstream).context("Setting up upstream forwarder")?);
    let metrics_client = Data::new(metrics_client);
    let num_workers = settings.http.workers;
    let allowed_origins = settings.cors.allowed_origins.clone();
    let well_known_dir =
        well_known::existing_dir(settings.http.well_known_dir.as_deref()).map(Path::to_path_buf);
    let settings = Data::new(settings);

    tracing::info!(
        r#type = "web.configuring",
        endpoints = ?catalog.iter().map(|endpoint| endpoint.name).collect::<Vec<_>>(),
        ?forwarder,
        "Configured search endpoints"
    );

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(settings.clone())
            .app_data(catalog.clone())
            .app_data(forwarder.clone())
            .app_data(metrics_client.clone())
            .wrap(middleware::Sentry)
            .wrap(middleware::Metrics)
            .wrap(TracingLogger::<GatewayRootSpanBuilder>::new())
            .wrap(cors(&allowed_origins))
            // The core functionality of the gateway
            .service(web::scope("/search").configure(search::configure))
            .service(root_info)
            // Liveness and the behavior necessary to satisfy Dockerflow.
            .configure(dockerflow::configure)
            // The plugin manifest, when there is one to serve.
            .configure(|config| well_known::configure(config, well_known_dir.as_deref()))
            .default_service(web::to(not_found))
    })
    .listen(listener)
    .context("Listening for connections")?;

    if let Some(n) = num_workers {
        server = server.workers(n);
    }

    Ok(server.run())
}

/// Build the CORS policy. Any method and header are allowed from the
/// configured origins, with credentials.
fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
}

/// The root view, to show that the service is running.
#[get("/")]
async fn root_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Search gateway is running" }))
}

/// Fallback for any path no route matches.
async fn not_found() -> Result<HttpResponse, HandlerError> {
    Err(HandlerErrorKind::NotFound.into())
}
