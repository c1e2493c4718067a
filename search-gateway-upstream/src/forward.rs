//! Sending a [`CanonicalRequest`] to the upstream search API.

use crate::{
    error::{ForwardError, SetupError},
    rules::EndpointSpec,
    validate::CanonicalRequest,
};
use anyhow::{anyhow, Context};
use reqwest::{StatusCode, Url};
use search_gateway_settings::UpstreamSettings;
use serde_json::value::RawValue;
use std::fmt;

/// User-Agent sent to the upstream.
const REQWEST_USER_AGENT: &str = concat!("search-gateway/", env!("CARGO_PKG_VERSION"));

/// Header carrying the client identifier.
pub const CLIENT_ID_HEADER: &str = "X-Naver-Client-Id";

/// Header carrying the client secret.
pub const CLIENT_SECRET_HEADER: &str = "X-Naver-Client-Secret";

/// What came back from a single upstream request.
#[derive(Debug)]
pub enum UpstreamOutcome {
    /// A 2xx response whose body is valid JSON, kept exactly as received.
    Success(Box<RawValue>),

    /// A non-2xx response.
    UpstreamHttpError {
        /// The status the upstream answered with.
        status: StatusCode,
        /// The response body, or a note about why it couldn't be read.
        body: String,
    },

    /// The request failed before a usable response arrived.
    TransportError(anyhow::Error),
}

impl UpstreamOutcome {
    /// Split the outcome into the body to return or the error to report.
    ///
    /// # Errors
    /// [`ForwardError::UpstreamHttp`] or [`ForwardError::Transport`], matching
    /// the failed outcome.
    pub fn into_result(self) -> Result<Box<RawValue>, ForwardError> {
        match self {
            Self::Success(body) => Ok(body),
            Self::UpstreamHttpError { status, body } => Err(ForwardError::UpstreamHttp {
                status: status.as_u16(),
                body,
            }),
            Self::TransportError(error) => Err(ForwardError::Transport(error)),
        }
    }
}

/// Forwards validated requests to the upstream search API.
///
/// Built once at start up. The client pools connections, so one forwarder
/// should be shared by every request.
pub struct Forwarder {
    /// The HTTP client used for every upstream request.
    client: reqwest::Client,
    /// Scheme, host and port of the upstream, always ending in `/`.
    base_url: Url,
    /// Sent as [`CLIENT_ID_HEADER`].
    client_id: String,
    /// Sent as [`CLIENT_SECRET_HEADER`].
    client_secret: String,
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    /// Create a forwarder from settings.
    ///
    /// # Errors
    /// If the base URL can't be parsed or the HTTP client can't be built.
    pub fn new(settings: &UpstreamSettings) -> Result<Self, SetupError> {
        let mut base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("parsing upstream base URL {:?}", settings.base_url))
            .map_err(SetupError::InvalidConfiguration)?;
        if base_url.cannot_be_a_base() {
            return Err(SetupError::InvalidConfiguration(anyhow!(
                "upstream base URL {} cannot be a base",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = reqwest::Client::builder().user_agent(REQWEST_USER_AGENT);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .context("Unable to create the Reqwest client")
            .map_err(SetupError::Network)?;

        Ok(Self {
            client,
            base_url,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        })
    }

    /// The full upstream URL for `endpoint`, without a query string.
    ///
    /// # Errors
    /// If the endpoint's resource path does not form a valid URL.
    pub fn endpoint_url(&self, endpoint: &EndpointSpec) -> anyhow::Result<Url> {
        let path = endpoint.resource_path();
        self.base_url
            .join(&path)
            .with_context(|| format!("joining {:?} to the upstream base URL", path))
    }

    /// Send one GET request for `request` to `endpoint`'s resource.
    ///
    /// There are no retries. Dropping the returned future aborts the request.
    pub async fn forward(
        &self,
        endpoint: &EndpointSpec,
        request: &CanonicalRequest,
    ) -> UpstreamOutcome {
        let url = match self.endpoint_url(endpoint) {
            Ok(url) => url,
            Err(error) => return UpstreamOutcome::TransportError(error),
        };
        tracing::debug!(
            r#type = "upstream.forward.request",
            endpoint = endpoint.name,
            %url,
            "Forwarding search request"
        );

        let response = match self
            .client
            .get(url)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(CLIENT_SECRET_HEADER, &self.client_secret)
            .query(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return UpstreamOutcome::TransportError(
                    anyhow::Error::new(error).context("sending upstream request"),
                )
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<unreadable body: {}>", error));
            return UpstreamOutcome::UpstreamHttpError { status, body };
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => {
                return UpstreamOutcome::TransportError(
                    anyhow::Error::new(error).context("reading upstream response"),
                )
            }
        };

        match serde_json::from_slice::<Box<RawValue>>(&bytes) {
            Ok(body) => UpstreamOutcome::Success(body),
            Err(error) => UpstreamOutcome::TransportError(
                anyhow::Error::new(error).context("parsing upstream response as JSON"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Forwarder, UpstreamOutcome};
    use crate::{
        endpoints::EndpointCatalog, error::ForwardError, error::SetupError, validate::validate,
    };
    use httpmock::{Method::GET, MockServer};
    use pretty_assertions::assert_eq;
    use search_gateway_settings::UpstreamSettings;
    use std::{collections::HashMap, time::Duration};

    fn settings(base_url: &str) -> UpstreamSettings {
        UpstreamSettings {
            base_url: base_url.to_string(),
            client_id: "test-id".to_string(),
            client_secret: "test-secret".to_string(),
            timeout: None,
        }
    }

    async fn forward(
        forwarder: &Forwarder,
        endpoint: &str,
        pairs: &[(&str, &str)],
    ) -> UpstreamOutcome {
        let catalog = EndpointCatalog::naver().expect("valid catalog");
        let endpoint = catalog.get(endpoint).expect("known endpoint");
        let raw: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let request = validate(endpoint, &raw).expect("valid request");
        forwarder.forward(endpoint, &request).await
    }

    #[test]
    fn bad_base_urls_are_rejected() {
        assert!(matches!(
            Forwarder::new(&settings("not a url")),
            Err(SetupError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            Forwarder::new(&settings("mailto:someone@example.com")),
            Err(SetupError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn endpoint_urls_keep_the_base_path() {
        let catalog = EndpointCatalog::naver().unwrap();
        let forwarder = Forwarder::new(&settings("https://gateway.example.com/naver")).unwrap();
        assert_eq!(
            forwarder
                .endpoint_url(catalog.get("image").unwrap())
                .unwrap()
                .as_str(),
            "https://gateway.example.com/naver/v1/search/image.json"
        );
    }

    #[tokio::test]
    async fn success_returns_the_body_verbatim() {
        let server = MockServer::start_async().await;
        let body = r#"{"lastBuildDate":"Mon, 01 Jan 2024 00:00:00 +0900","total":1,"items":[{"title":"ai"}]}"#;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/search/news.json")
                    .query_param("query", "ai")
                    .query_param("display", "10")
                    .query_param("start", "1")
                    .query_param("sort", "sim")
                    .header("x-naver-client-id", "test-id")
                    .header("x-naver-client-secret", "test-secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(body);
            })
            .await;

        let forwarder = Forwarder::new(&settings(&server.base_url())).unwrap();
        let outcome = forward(&forwarder, "news", &[("query", "ai")]).await;

        mock.assert_async().await;
        match outcome {
            UpstreamOutcome::Success(raw) => assert_eq!(raw.get(), body),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn shop_free_text_filters_are_forwarded() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/search/shop.json")
                    .query_param("query", "shoes")
                    .query_param("filter", "naverpay")
                    .query_param("exclude", "used:rental");
                then.status(200).body("{}");
            })
            .await;

        let forwarder = Forwarder::new(&settings(&server.base_url())).unwrap();
        let outcome = forward(
            &forwarder,
            "shop",
            &[
                ("query", "shoes"),
                ("filter", "naverpay"),
                ("exclude", "used:rental"),
            ],
        )
        .await;

        mock.assert_async().await;
        assert!(matches!(outcome, UpstreamOutcome::Success(_)));
    }

    #[tokio::test]
    async fn http_errors_keep_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/search/blog.json");
                then.status(403)
                    .body(r#"{"errorMessage":"Scope Status Invalid","errorCode":"024"}"#);
            })
            .await;

        let forwarder = Forwarder::new(&settings(&server.base_url())).unwrap();
        let error = forward(&forwarder, "blog", &[("query", "rust")])
            .await
            .into_result()
            .expect_err("403 is an error");

        match &error {
            ForwardError::UpstreamHttp { status, body } => {
                assert_eq!(*status, 403);
                assert!(body.contains("Scope Status Invalid"));
            }
            other => panic!("expected an HTTP error, got {:?}", other),
        }
        assert!(error.to_string().contains("403"));
    }

    #[tokio::test]
    async fn non_json_success_is_a_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/search/kin.json");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let forwarder = Forwarder::new(&settings(&server.base_url())).unwrap();
        let outcome = forward(&forwarder, "kin", &[("query", "rust")]).await;
        assert!(matches!(outcome, UpstreamOutcome::TransportError(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/search/news.json");
                then.status(200)
                    .body("{}")
                    .delay(Duration::from_millis(500));
            })
            .await;

        let mut upstream = settings(&server.base_url());
        upstream.timeout = Some(Duration::from_millis(50));
        let forwarder = Forwarder::new(&upstream).unwrap();
        let outcome = forward(&forwarder, "news", &[("query", "ai")]).await;
        assert!(
            matches!(outcome, UpstreamOutcome::TransportError(_)),
            "expected a transport error, got {:?}",
            outcome
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        // Port 9 (discard) is not expected to be listening.
        let forwarder = Forwarder::new(&settings("http://127.0.0.1:9")).unwrap();
        let error = forward(&forwarder, "local", &[("query", "cafe")])
            .await
            .into_result()
            .expect_err("nothing is listening");
        assert!(matches!(error, ForwardError::Transport(_)));
        assert_eq!(error.to_string(), "Could not reach the upstream search API");
    }
}
