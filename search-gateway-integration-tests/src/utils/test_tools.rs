//! Tools for running tests

use crate::utils::metrics::MetricsWatcher;
use httpmock::MockServer;
use reqwest::{redirect, Client, ClientBuilder, RequestBuilder};
use search_gateway_settings::Settings;
use std::{future::Future, net::TcpListener};
use tracing::instrument::{Instrument, WithSubscriber};
use tracing_subscriber::layer::SubscriberExt;

/// Run a test with a fully configured search gateway.
///
/// The server will listen on a port assigned arbitrarily by the OS, and its
/// upstream is a mock server that answers nothing until the test adds mocks
/// to it.
///
/// A suite of tools will be passed to the test function in the form of an
/// instance of [`TestingTools`]. It includes an HTTP client configured to use
/// the test server, the mock upstream search API, and a collector that can
/// make assertions about the metrics that were emitted.
///
/// `settings_changer` runs after the upstream has been pointed at the mock,
/// so it can point it somewhere else.
///
/// # Example
///
/// ```
/// # use search_gateway_integration_tests::{gateway_test, TestingTools};
/// #[actix_rt::test]
/// async fn a_test() {
///     gateway_test(
///         |settings| settings.log_full_request = false,
///         |TestingTools { test_client, upstream_mock, .. }| async move {
///             assert!(true) // Test goes here
///         }
///     ).await
/// }
/// ```
///
/// # Panics
/// May panic if tests could not be set up correctly.
pub async fn gateway_test<FSettings, FTest, Fut>(
    settings_changer: FSettings,
    test: FTest,
) -> Fut::Output
where
    FSettings: FnOnce(&mut Settings),
    FTest: FnOnce(TestingTools) -> Fut,
    Fut: Future,
{
    let test_span = tracing::info_span!("gateway_test");

    // Load settings
    let mut settings = Settings::load_for_tests(|_| ());

    // Set up logging
    let env_filter: tracing_subscriber::EnvFilter = (&settings.logging.levels).into();
    let tracing_subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().pretty().with_test_writer());

    let _tracing_subscriber_guard = tracing::subscriber::set_default(tracing_subscriber);

    // Set up a mock server to stand in for the upstream search API
    let upstream_mock = MockServer::start_async().await;
    settings.upstream.base_url = upstream_mock.base_url();

    settings_changer(&mut settings);

    // Setup metrics
    assert_eq!(
        settings.metrics.sink_host, "0.0.0.0",
        "Tests cannot change the metrics sink host, since it is ignored"
    );
    let (metrics_watcher, metrics_client) = MetricsWatcher::new_with_client();

    // Run server in the background
    let listener = TcpListener::bind(settings.http.listen).expect("Failed to bind to a port");
    let address = listener
        .local_addr()
        .expect("Listener has no local address")
        .to_string();
    let server = search_gateway_web::run(listener, metrics_client, settings)
        .expect("Failed to start server");
    let server_handle = tokio::spawn(server.with_current_subscriber());
    let test_client = TestReqwestClient::new(address);

    // Assemble the tools
    let tools = TestingTools {
        test_client,
        upstream_mock,
        metrics_watcher,
    };
    // Run the test
    let rv = test(tools).instrument(test_span).await;
    server_handle.abort();
    rv
}

/// A set of tools for tests, including the mock upstream and metrics helpers.
///
/// The fields of this struct are marked as non-exhaustive, meaning that any
/// destructuring of this struct will require a `..` "and the rest" entry, even
/// if all present items are named. This makes adding tools in the future easier,
/// since old tests won't need to be rewritten to account for the added tools.
#[non_exhaustive]
pub struct TestingTools {
    /// A wrapper around a `reqwest::client` that automatically uses the
    /// gateway under test.
    pub test_client: TestReqwestClient,

    /// A [`httpmock::MockServer`] that the gateway forwards searches to. Does
    /// not contain mock responses, any needed must be added.
    pub upstream_mock: MockServer,

    /// To make assertions about metrics.
    pub metrics_watcher: MetricsWatcher,
}

/// A wrapper around a `[reqwest::client]` that automatically sends requests to
/// the test server.
///
/// This only handles `GET` requests right now. Other methods should be
/// added as needed.
///
/// The client is configured to not follow any redirects.
pub struct TestReqwestClient {
    /// The wrapped client.
    client: Client,

    /// The server address to implicitly use for all requests.
    address: String,
}

impl TestReqwestClient {
    /// Construct a new test client that uses `address` for every request given.
    pub fn new(address: String) -> Self {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::none())
            .build()
            .expect("Could not build test client");
        Self { client, address }
    }

    /// Start building a GET request to the test server with the path specified.
    ///
    /// The path should start with `/`, such as `/search/news?query=rust`.
    pub fn get(&self, path: &str) -> RequestBuilder {
        assert!(path.starts_with('/'));
        let url = format!("http://{}{}", &self.address, path);
        self.client.get(url)
    }
}
