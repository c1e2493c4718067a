//! Web handlers for the search API.

use std::collections::HashMap;

use crate::errors::{HandlerError, HandlerErrorKind};
use actix_web::{
    get,
    web::{self, Data, ServiceConfig},
    HttpResponse,
};
use cadence::{CountedExt, StatsdClient};
use search_gateway_settings::Settings;
use search_gateway_upstream::{
    validate, CanonicalRequest, EndpointCatalog, EndpointSpec, ForwardError, Forwarder,
};

/// Configure a route to use the search service.
pub fn configure(config: &mut ServiceConfig) {
    config.service(search);
}

/// Validate the query against the named endpoint's rules and forward it
/// upstream, returning the upstream's JSON unchanged.
#[get("/{endpoint}")]
#[tracing::instrument(skip_all, fields(endpoint = %endpoint))]
async fn search(
    endpoint: web::Path<String>,
    web::Query(raw): web::Query<HashMap<String, String>>,
    catalog: Data<EndpointCatalog>,
    forwarder: Data<Forwarder>,
    metrics_client: Data<StatsdClient>,
    settings: Data<Settings>,
) -> Result<HttpResponse, HandlerError> {
    let spec = catalog
        .get(&endpoint)
        .ok_or_else(|| HandlerErrorKind::UnknownEndpoint(endpoint.into_inner()))?;

    let request = validate(spec, &raw).map_err(|error| {
        tracing::info!(
            r#type = "web.search.invalid",
            parameter = error.key(),
            %error,
            "Rejecting search request"
        );
        count_request(&metrics_client, spec, "invalid");
        error
    })?;

    safe_log_request(settings.log_full_request, spec, &request);

    let body = forwarder
        .forward(spec, &request)
        .await
        .into_result()
        .map_err(|error| {
            match &error {
                ForwardError::UpstreamHttp { status, .. } => {
                    tracing::error!(
                        r#type = "web.search.upstream-error",
                        %error,
                        upstream_status = *status,
                        "Upstream rejected search request"
                    );
                    count_request(&metrics_client, spec, "upstream-error");
                }
                ForwardError::Transport(cause) => {
                    tracing::error!(
                        r#type = "web.search.transport-error",
                        error = ?cause,
                        "Could not complete upstream search request"
                    );
                    count_request(&metrics_client, spec, "transport-error");
                }
            }
            error
        })?;

    count_request(&metrics_client, spec, "success");

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body.get().to_owned()))
}

/// Count a search request, tagged with its endpoint and how it ended.
fn count_request(metrics_client: &StatsdClient, spec: &EndpointSpec, outcome: &str) {
    metrics_client
        .incr_with_tags("search.request")
        .with_tag("endpoint", spec.name)
        .with_tag("outcome", outcome)
        .send();
}

/// Log a search request, respecting the `log_full_request` setting passed.
/// The query text is only logged when that is set. Other parameters are
/// always logged.
fn safe_log_request(log_query: bool, spec: &EndpointSpec, request: &CanonicalRequest) {
    let query = if log_query {
        request
            .get("query")
            .map(ToString::to_string)
            .unwrap_or_default()
    } else {
        String::new()
    };
    let parameters = request
        .iter()
        .filter(|(key, _)| *key != "query")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",");

    tracing::info!(
        r#type = "web.search.request",
        sensitive = log_query,
        endpoint = spec.name,
        %query,
        %parameters,
        "handling search request"
    );
}
