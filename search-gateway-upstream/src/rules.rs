//! The description of what each search endpoint accepts.

use serde::{Serialize, Serializer};
use std::{borrow::Cow, fmt, ops::RangeInclusive};

/// A validated parameter value, ready to be sent upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterValue {
    /// A string value, sent as given.
    Text(Cow<'static, str>),
    /// A base-10 integer.
    Integer(i64),
}

impl ParameterValue {
    /// The value as a string, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Integer(_) => None,
        }
    }

    /// The value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Integer(n) => serializer.serialize_i64(*n),
        }
    }
}

impl From<&'static str> for ParameterValue {
    fn from(text: &'static str) -> Self {
        Self::Text(Cow::Borrowed(text))
    }
}

impl From<i64> for ParameterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

/// How a raw parameter is converted and checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    /// Any string is accepted.
    Text,
    /// A base-10 integer within the inclusive bounds.
    Integer(RangeInclusive<i64>),
    /// One of a fixed set of strings, compared case sensitively.
    Enumerated(&'static [&'static str]),
}

/// One accepted query parameter. The key is the same inbound and upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterRule {
    /// The query parameter name.
    pub key: &'static str,
    /// Whether a request without this parameter is rejected.
    pub required: bool,
    /// How the raw value is interpreted.
    pub kind: ParameterKind,
    /// Used when the parameter is absent. Ignored for required parameters.
    pub default: Option<ParameterValue>,
}

impl ParameterRule {
    /// A required string parameter.
    pub fn required_text(key: &'static str) -> Self {
        Self {
            key,
            required: true,
            kind: ParameterKind::Text,
            default: None,
        }
    }

    /// An optional string parameter that is left out when absent.
    pub fn optional_text(key: &'static str) -> Self {
        Self {
            key,
            required: false,
            kind: ParameterKind::Text,
            default: None,
        }
    }

    /// An optional integer parameter with inclusive bounds and a default.
    pub fn integer(key: &'static str, bounds: RangeInclusive<i64>, default: i64) -> Self {
        Self {
            key,
            required: false,
            kind: ParameterKind::Integer(bounds),
            default: Some(ParameterValue::Integer(default)),
        }
    }

    /// An optional parameter restricted to `allowed`, with a default.
    pub fn enumerated(
        key: &'static str,
        allowed: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            key,
            required: false,
            kind: ParameterKind::Enumerated(allowed),
            default: Some(ParameterValue::from(default)),
        }
    }

    /// Whether an empty value is dropped as if the parameter were absent.
    /// Only optional text without a default is.
    pub fn omits_when_empty(&self) -> bool {
        !self.required && self.default.is_none() && self.kind == ParameterKind::Text
    }

    /// Whether `value` is something this rule could have produced.
    pub(crate) fn admits(&self, value: &ParameterValue) -> bool {
        match (&self.kind, value) {
            (ParameterKind::Text, ParameterValue::Text(_)) => true,
            (ParameterKind::Integer(bounds), ParameterValue::Integer(n)) => bounds.contains(n),
            (ParameterKind::Enumerated(allowed), ParameterValue::Text(text)) => {
                allowed.iter().any(|candidate| *candidate == &**text)
            }
            _ => false,
        }
    }
}

/// One search category and the upstream resource it is forwarded to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSpec {
    /// The name used in the inbound path, such as `news`.
    pub name: &'static str,
    /// The upstream resource, relative to `/v1/search/`.
    pub upstream_path: &'static str,
    /// Appended to `upstream_path`, such as `.json`.
    pub upstream_suffix: &'static str,
    /// The accepted parameters. Order matters: validation reports the first
    /// failing rule.
    pub rules: Vec<ParameterRule>,
}

impl EndpointSpec {
    /// The upstream resource path, relative to the upstream's base URL.
    pub fn resource_path(&self) -> String {
        format!("v1/search/{}{}", self.upstream_path, self.upstream_suffix)
    }

    /// Find the rule for `key`, if this endpoint accepts it.
    pub fn rule(&self, key: &str) -> Option<&ParameterRule> {
        self.rules.iter().find(|rule| rule.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_rule_admits_its_bounds_only() {
        let rule = ParameterRule::integer("display", 1..=5, 1);
        assert!(rule.admits(&ParameterValue::Integer(1)));
        assert!(rule.admits(&ParameterValue::Integer(5)));
        assert!(!rule.admits(&ParameterValue::Integer(6)));
        assert!(!rule.admits(&"1".into()));
    }

    #[test]
    fn only_optional_text_without_default_omits_empty_values() {
        assert!(ParameterRule::optional_text("filter").omits_when_empty());
        assert!(!ParameterRule::required_text("query").omits_when_empty());
        assert!(!ParameterRule::enumerated("sort", &["sim"], "sim").omits_when_empty());
        assert!(!ParameterRule::integer("display", 1..=5, 1).omits_when_empty());
    }

    #[test]
    fn enumerated_rule_is_case_sensitive() {
        let rule = ParameterRule::enumerated("sort", &["sim", "date"], "sim");
        assert!(rule.admits(&"date".into()));
        assert!(!rule.admits(&"Date".into()));
    }

    #[test]
    fn resource_path_includes_suffix() {
        let spec = EndpointSpec {
            name: "news",
            upstream_path: "news",
            upstream_suffix: ".json",
            rules: vec![ParameterRule::required_text("query")],
        };
        assert_eq!(spec.resource_path(), "v1/search/news.json");
        assert!(spec.rule("query").is_some());
        assert!(spec.rule("display").is_none());
    }

    #[test]
    fn values_serialize_as_plain_scalars() {
        assert_eq!(
            serde_json::to_value(ParameterValue::Integer(10)).unwrap(),
            serde_json::json!(10)
        );
        assert_eq!(
            serde_json::to_value(ParameterValue::from("sim")).unwrap(),
            serde_json::json!("sim")
        );
    }
}
