use anyhow::{bail, Context};
use serde::{de, ser::SerializeSeq, Deserialize, Serialize};
use std::{ops::AddAssign, str::FromStr};
use tracing_subscriber::{filter::Directive, EnvFilter};

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// The minimum level that logs should be reported at.
    ///
    /// Each entry can be one of `ERROR`, `WARN`, `INFO`, `DEBUG`, or `TRACE` (in
    /// increasing verbosity), with an optional component that specifies the
    /// source of the logs.
    ///
    /// Directives from the environment variable `RUST_LOG` are appended to the
    /// configured ones, so they take precedence.
    ///
    /// # Examples
    ///
    /// The configurations below are identical
    ///
    /// ```yaml
    /// # config/local.yaml
    /// logging:
    ///   levels:
    ///     - INFO                             # default to INFO
    ///     - search_gateway_upstream=DEBUG    # see every forwarded request
    /// ```
    ///
    /// ```shell
    /// RUST_LOG=INFO,search_gateway_upstream=DEBUG
    /// ```
    pub levels: DirectiveWrapper,

    /// The format to output logs in.
    pub format: LogFormat,
}

/// The output formats available for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// [`tracing-subscriber`]'s human targeted, pretty format. Multiple lines
    /// per log event.
    Pretty,

    /// Newline delimited JSON objects, for log aggregation. One line per log event.
    Json,

    /// [`tracing-subscriber`]'s default format. One line per log event.
    Compact,
}

/// Tracing's Directive object for filter logs isn't `Clone` or `Serializable`.
/// This wraps a collection of directives so that we can work more easily
/// with it.
///
/// It can be deserialized from either a comma separated string of directives
/// (`"INFO,component1=WARN"`), or from a sequence of comma separated strings
/// (`["INFO", "component1=WARN,component2=DEBUG"]`). Config files use
/// sequences, but environment variables are always strings.
///
/// Every entry in this struct is guaranteed to be parsable as a valid Directive.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveWrapper(Vec<String>);

impl DirectiveWrapper {
    /// The directives held, in order.
    pub fn directives(&self) -> &[String] {
        &self.0
    }
}

impl Serialize for DirectiveWrapper {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for directive in &self.0 {
            seq.serialize_element(&directive)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DirectiveWrapper {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = DirectiveWrapper;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "directive or list of directives")
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                s.parse().map_err(|err: anyhow::Error| {
                    de::Error::invalid_value(de::Unexpected::Str(s), &err.to_string().as_str())
                })
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut rv = DirectiveWrapper(vec![]);

                while let Some(item) = seq.next_element::<String>()? {
                    let parsed: DirectiveWrapper = item.parse().map_err(|err: anyhow::Error| {
                        de::Error::invalid_value(
                            de::Unexpected::Str(&item),
                            &err.to_string().as_str(),
                        )
                    })?;
                    rv += parsed;
                }

                Ok(rv)
            }
        }

        let mut rv = deserializer.deserialize_any(Visitor)?;

        // RUST_LOG should always be respected.
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if !rust_log.trim().is_empty() {
                let from_env: DirectiveWrapper = rust_log.parse().map_err(|_err| {
                    de::Error::invalid_value(de::Unexpected::Str(&rust_log), &"valid directive")
                })?;
                rv += from_env;
            }
        }

        Ok(rv)
    }
}

impl FromStr for DirectiveWrapper {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect();

        if let Some(err) = parts.iter().find_map(|p| p.parse::<Directive>().err()) {
            return Err(err).context("valid syntax");
        }

        // Crate names are logged with underscores, so a hyphen never matches.
        if parts.iter().any(|p| p.contains('-')) {
            bail!("log targets must not include hyphens");
        }

        Ok(Self(parts))
    }
}

impl AddAssign for DirectiveWrapper {
    fn add_assign(&mut self, rhs: Self) {
        self.0.extend(rhs.0)
    }
}

impl From<&DirectiveWrapper> for EnvFilter {
    fn from(val: &DirectiveWrapper) -> Self {
        val.0
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(EnvFilter::default(), EnvFilter::add_directive)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectiveWrapper, LogFormat};
    use parameterized::parameterized;
    use pretty_assertions::assert_eq;

    #[parameterized(input = {
        "INFO",
        "INFO,search_gateway_web=DEBUG",
        " WARN , search_gateway_upstream=TRACE ",
    })]
    fn valid_directives_parse(input: &str) {
        assert!(input.parse::<DirectiveWrapper>().is_ok());
    }

    #[test]
    fn hyphenated_targets_are_rejected() {
        let err = "search-gateway-web=DEBUG"
            .parse::<DirectiveWrapper>()
            .expect_err("hyphens should be rejected");
        assert!(err.to_string().contains("hyphens"));
    }

    #[test]
    fn sequences_are_flattened() {
        let wrapper: DirectiveWrapper =
            serde_json::from_value(serde_json::json!(["INFO", "a=WARN,b=DEBUG"]))
                .expect("valid directives");
        assert!(wrapper.directives().starts_with(&[
            "INFO".to_string(),
            "a=WARN".to_string(),
            "b=DEBUG".to_string()
        ]));
    }

    #[test]
    fn log_format_is_lowercase() {
        let format: LogFormat = serde_json::from_value(serde_json::json!("json")).unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
