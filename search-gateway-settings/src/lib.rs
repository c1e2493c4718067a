#![warn(missing_docs, clippy::missing_docs_in_private_items)]

//! # Search Gateway Settings
//!
//! Configuration is specified in several ways, with later methods overriding earlier ones.
//!
//! 1. A base configuration checked into the repository, in `config/base.yaml`.
//!    This provides the default values for most settings.
//! 2. Per-environment configuration files in the `config` directory. The
//!    environment is selected using the environment variable `GATEWAY_ENV`. The
//!    settings for that environment are then loaded from `config/${env}.yaml`, if
//!    it exists. The default environment is "development". A "production"
//!    environment is also provided.
//! 3. A local configuration file not checked into the repository, at
//!    `config/local.yaml`. This file is in `.gitignore` and is safe to use for
//!    local configuration and secrets if desired.
//! 4. Environment variables that begin with `GATEWAY_` and use `__` to separate
//!    levels. For example, `Settings::http::workers` can be controlled from the
//!    environment variable `GATEWAY_HTTP__WORKERS`.
//! 5. The upstream credentials can also be given with `NAVER_CLIENT_ID` and
//!    `NAVER_CLIENT_SECRET`, which win over every other source. Empty values
//!    of these two variables are ignored.
//!
//! The upstream credentials have no default. Loading fails if they are not
//! provided by one of the sources above, or if they are empty.
//!
//! Tests should use `Settings::load_for_tests` which only reads from
//! `config/base.yaml`, `config/test.yaml`, and `config/local_test.yaml` (if it
//! exists). It does not read from environment variables.

mod logging;

pub use logging::{DirectiveWrapper, LogFormat, LoggingSettings};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::{collections::HashMap, fmt, net::SocketAddr, path::PathBuf, time::Duration};

/// Top level settings object for the search gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// The environment the gateway is running in. Should only be set with the
    /// `GATEWAY_ENV` environment variable.
    pub env: String,

    /// Enable additional features to debug the application. This should not be
    /// set to true in production environments.
    pub debug: bool,

    /// Log the text of incoming search queries. Queries can contain sensitive
    /// user input.
    pub log_full_request: bool,

    /// Settings for the HTTP server.
    pub http: HttpSettings,

    /// Cross origin request settings.
    pub cors: CorsSettings,

    /// Settings for the upstream search API.
    pub upstream: UpstreamSettings,

    /// Logging settings.
    pub logging: LoggingSettings,

    /// Metrics settings.
    pub metrics: MetricsSettings,

    /// Sentry error reporting settings.
    pub sentry: SentrySettings,
}

/// Settings for the HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpSettings {
    /// The host and port to listen on, such as "127.0.0.1:8080" or "0.0.0.0:80".
    pub listen: SocketAddr,

    /// The number of workers to use. Optional. If no value is provided, the
    /// number of logical cores will be used.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Directory served under `/.well-known`, such as the one holding
    /// `ai-plugin.json`. Nothing is served there if it is unset or the
    /// directory doesn't exist.
    #[serde(default)]
    pub well_known_dir: Option<PathBuf>,
}

/// Settings for cross origin requests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CorsSettings {
    /// Origins that browsers may call the gateway from, such as
    /// `https://chatgpt.com`.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Settings for the upstream search API.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// Scheme, host and optional port of the upstream, such as
    /// `https://openapi.naver.com`.
    pub base_url: String,

    /// Sent as the `X-Naver-Client-Id` header.
    pub client_id: String,

    /// Sent as the `X-Naver-Client-Secret` header.
    pub client_secret: String,

    /// Total time allowed for one upstream request. If unset, the HTTP
    /// client's default applies.
    #[serde_as(as = "Option<DurationMilliSeconds>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Option<Duration>,
}

impl fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl UpstreamSettings {
    /// Fail if either credential is empty.
    fn check_credentials(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("upstream.client_id", &self.client_id),
            ("upstream.client_secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

/// Settings for the statsd metrics sink.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// The host to send metrics to.
    pub sink_host: String,

    /// The port to send metrics to.
    pub sink_port: u16,

    /// The size of the queue in front of the UDP sink, in kilobytes.
    pub max_queue_size_kb: usize,
}

/// Settings for Sentry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SentrySettings {
    /// The DSN to report to. Reporting is disabled if this is not set.
    #[serde(default)]
    pub dsn: Option<String>,

    /// Log every event that is sent to Sentry.
    #[serde(default)]
    pub debug: bool,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// # Errors
    /// If any of the configured values are invalid, if any of the required
    /// configuration files are missing, or if the upstream credentials are
    /// not configured.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config", std::env::vars().collect())
    }

    /// Load settings from the configuration files in `config_dir`, with `env`
    /// standing in for the process environment.
    fn load_from(config_dir: &str, env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let gateway_env = env
            .get("GATEWAY_ENV")
            .cloned()
            .unwrap_or_else(|| "development".to_string());
        // An empty variable is treated as unset.
        let credential = |name: &str| env.get(name).filter(|value| !value.is_empty()).cloned();
        let client_id = credential("NAVER_CLIENT_ID");
        let client_secret = credential("NAVER_CLIENT_SECRET");

        let settings: Self = Config::builder()
            // Start off with the base config.
            .add_source(File::with_name(&format!("{}/base", config_dir)))
            .set_override("env", gateway_env.as_str())?
            // Merge in an environment specific config.
            .add_source(
                File::with_name(&format!("{}/{}", config_dir, gateway_env)).required(false),
            )
            // Add a local configuration file that is `.gitignore`ed.
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // Add environment variables that start with "GATEWAY_" and have "__"
            // to separate levels. For example, `GATEWAY_HTTP__LISTEN` maps to
            // `Settings::http::listen`.
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(env)),
            )
            .set_override_option("upstream.client_id", client_id)?
            .set_override_option("upstream.client_secret", client_secret)?
            .build()?
            .try_deserialize()?;

        settings.upstream.check_credentials()?;
        Ok(settings)
    }

    /// Load settings from configuration files for tests.
    ///
    /// `changer` is called with the loaded settings before they are returned,
    /// so each test can adjust what it needs.
    ///
    /// # Panics
    /// If the test configuration files cannot be loaded.
    pub fn load_for_tests<F: FnOnce(&mut Self)>(changer: F) -> Self {
        let mut settings: Self = Config::builder()
            .add_source(File::with_name("../config/base"))
            .set_override("env", "test")
            .expect("Could not set env for tests")
            .add_source(File::with_name("../config/test"))
            // Add a local configuration file that is `.gitignore`ed.
            .add_source(File::with_name("../config/local_test").required(false))
            .build()
            .expect("Could not load settings for tests")
            .try_deserialize()
            .expect("Could not convert settings");

        changer(&mut settings);
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use pretty_assertions::assert_eq;
    use std::{collections::HashMap, time::Duration};

    /// Load from the workspace `config` directory with only `pairs` set in
    /// the environment.
    fn load_with_env(pairs: &[(&str, &str)]) -> Result<Settings, config::ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::load_from("../config", env)
    }

    #[test]
    fn load_fails_without_credentials() {
        let result = load_with_env(&[("GATEWAY_ENV", "production")]);
        assert!(result.is_err(), "loaded {:?}", result);
    }

    #[test]
    fn load_reads_credentials_from_gateway_variables() {
        let settings = load_with_env(&[
            ("GATEWAY_ENV", "production"),
            ("GATEWAY_UPSTREAM__CLIENT_ID", "gateway-id"),
            ("GATEWAY_UPSTREAM__CLIENT_SECRET", "gateway-secret"),
        ])
        .expect("credentials are configured");
        assert_eq!(settings.env, "production");
        assert_eq!(settings.upstream.client_id, "gateway-id");
        assert_eq!(settings.upstream.client_secret, "gateway-secret");
    }

    #[test]
    fn naver_variables_take_precedence() {
        let settings = load_with_env(&[
            ("GATEWAY_ENV", "test"),
            ("GATEWAY_UPSTREAM__CLIENT_ID", "gateway-id"),
            ("GATEWAY_UPSTREAM__CLIENT_SECRET", "gateway-secret"),
            ("NAVER_CLIENT_ID", "naver-id"),
        ])
        .expect("credentials are configured");
        assert_eq!(settings.upstream.client_id, "naver-id");
        assert_eq!(settings.upstream.client_secret, "gateway-secret");

        // Over the config files too.
        let settings = load_with_env(&[
            ("GATEWAY_ENV", "test"),
            ("NAVER_CLIENT_SECRET", "naver-secret"),
        ])
        .expect("credentials are configured");
        assert_eq!(settings.upstream.client_id, "test-client-id");
        assert_eq!(settings.upstream.client_secret, "naver-secret");
    }

    #[test]
    fn empty_naver_variables_are_ignored() {
        let settings = load_with_env(&[
            ("GATEWAY_ENV", "test"),
            ("NAVER_CLIENT_ID", ""),
            ("NAVER_CLIENT_SECRET", ""),
        ])
        .expect("credentials come from the test config");
        assert_eq!(settings.upstream.client_id, "test-client-id");
        assert_eq!(settings.upstream.client_secret, "test-client-secret");

        let result = load_with_env(&[
            ("GATEWAY_ENV", "production"),
            ("NAVER_CLIENT_ID", ""),
            ("NAVER_CLIENT_SECRET", ""),
        ]);
        assert!(result.is_err(), "loaded {:?}", result);
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let error = load_with_env(&[
            ("GATEWAY_ENV", "test"),
            ("GATEWAY_UPSTREAM__CLIENT_SECRET", ""),
        ])
        .expect_err("an empty secret is not a credential");
        assert!(
            error.to_string().contains("upstream.client_secret must not be empty"),
            "unexpected error: {}",
            error
        );
    }

    #[test]
    fn test_settings_load() {
        let settings = Settings::load_for_tests(|_| ());
        assert_eq!(settings.env, "test");
        assert_eq!(settings.upstream.client_id, "test-client-id");
        assert_eq!(settings.http.workers, Some(1));
        assert_eq!(
            settings.http.well_known_dir.as_deref(),
            Some(std::path::Path::new(".well-known"))
        );
        assert_eq!(settings.upstream.timeout, None);
        assert_eq!(
            settings.cors.allowed_origins,
            vec!["https://chat.openai.com", "https://chatgpt.com"]
        );
    }

    #[test]
    fn changer_is_applied() {
        let settings = Settings::load_for_tests(|settings| {
            settings.upstream.timeout = Some(Duration::from_millis(250));
        });
        assert_eq!(settings.upstream.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn debug_output_hides_the_client_secret() {
        let settings = Settings::load_for_tests(|_| ());
        let debugged = format!("{:?}", settings.upstream);
        assert!(debugged.contains("test-client-id"));
        assert!(!debugged.contains("test-client-secret"));
    }

    #[test]
    fn timeout_is_read_in_milliseconds() {
        let upstream: super::UpstreamSettings = serde_json::from_value(serde_json::json!({
            "base_url": "https://openapi.naver.com",
            "client_id": "id",
            "client_secret": "secret",
            "timeout_ms": 1500,
        }))
        .expect("valid upstream settings");
        assert_eq!(upstream.timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn credentials_are_required() {
        let result = serde_json::from_value::<super::UpstreamSettings>(serde_json::json!({
            "base_url": "https://openapi.naver.com",
        }));
        assert!(result.is_err());
    }
}
