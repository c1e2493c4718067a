//! Turning raw query parameters into a [`CanonicalRequest`].

use crate::{
    error::ValidationError,
    rules::{EndpointSpec, ParameterKind, ParameterValue},
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{borrow::Cow, collections::HashMap};

/// Validated, typed and defaulted parameters for one endpoint, in rule order.
///
/// Contains only keys the endpoint defines. Optional parameters without a
/// default are left out when the caller didn't send them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Parameters in the order of the endpoint's rules.
    params: Vec<(&'static str, ParameterValue)>,
}

impl CanonicalRequest {
    /// The value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The keys present, in rule order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().map(|(key, _)| *key)
    }

    /// Iterate over the key value pairs, in rule order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParameterValue)> {
        self.params.iter().map(|(key, value)| (*key, value))
    }

    /// The number of parameters present.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are present.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Serializes as a map, which is what the upstream query string is built from.
impl Serialize for CanonicalRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for (key, value) in &self.params {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Validate `raw` against the rules of `endpoint`.
///
/// Rules are checked in order and the first failure is returned. Parameters
/// in `raw` that the endpoint doesn't define are ignored.
///
/// # Errors
/// A [`ValidationError`] naming the first parameter that is missing, can't be
/// parsed, or is not an accepted value.
pub fn validate(
    endpoint: &EndpointSpec,
    raw: &HashMap<String, String>,
) -> Result<CanonicalRequest, ValidationError> {
    let mut params = Vec::with_capacity(endpoint.rules.len());

    for rule in &endpoint.rules {
        let value = match raw.get(rule.key) {
            None if rule.required => {
                return Err(ValidationError::MissingRequiredParameter(rule.key))
            }
            None => match &rule.default {
                Some(default) => default.clone(),
                None => continue,
            },
            Some(raw_value) if raw_value.is_empty() && rule.omits_when_empty() => continue,
            Some(raw_value) => convert(rule.key, &rule.kind, raw_value)?,
        };
        params.push((rule.key, value));
    }

    Ok(CanonicalRequest { params })
}

/// Convert a single raw value according to `kind`.
fn convert(
    key: &'static str,
    kind: &ParameterKind,
    raw_value: &str,
) -> Result<ParameterValue, ValidationError> {
    match kind {
        ParameterKind::Text => Ok(ParameterValue::Text(Cow::Owned(raw_value.to_owned()))),

        ParameterKind::Integer(bounds) => {
            let n: i64 = raw_value
                .parse()
                .map_err(|_| ValidationError::InvalidParameterType(key))?;
            if bounds.contains(&n) {
                Ok(ParameterValue::Integer(n))
            } else {
                Err(ValidationError::ParameterOutOfRange {
                    key,
                    min: *bounds.start(),
                    max: *bounds.end(),
                })
            }
        }

        ParameterKind::Enumerated(allowed) => allowed
            .iter()
            .find(|candidate| **candidate == raw_value)
            .map(|candidate| ParameterValue::Text(Cow::Borrowed(*candidate)))
            .ok_or(ValidationError::InvalidParameterValue {
                key,
                allowed: *allowed,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate, CanonicalRequest};
    use crate::{
        endpoints::EndpointCatalog,
        error::ValidationError,
        rules::{EndpointSpec, ParameterKind, ParameterValue},
    };
    use parameterized::parameterized;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn endpoint(name: &str) -> EndpointSpec {
        EndpointCatalog::naver()
            .expect("valid catalog")
            .get(name)
            .unwrap_or_else(|| panic!("no endpoint named {}", name))
            .clone()
    }

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn check(name: &str, pairs: &[(&str, &str)]) -> Result<CanonicalRequest, ValidationError> {
        validate(&endpoint(name), &raw(pairs))
    }

    #[parameterized(name = { "news", "blog", "image", "shop", "kin", "local" })]
    fn query_is_required(name: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(
            check(name, &[("display", "1")]),
            Err(ValidationError::MissingRequiredParameter("query"))
        );
    }

    #[test]
    fn news_defaults_are_filled_in() {
        let request = check("news", &[("query", "ai")]).expect("valid request");
        let pairs: Vec<_> = request
            .iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("query", "ai".to_string()),
                ("display", "10".to_string()),
                ("start", "1".to_string()),
                ("sort", "sim".to_string()),
            ]
        );
        assert_eq!(request.get("display"), Some(&ParameterValue::Integer(10)));
    }

    #[test]
    fn local_defaults_are_narrow() {
        let request = check("local", &[("query", "cafe")]).unwrap();
        assert_eq!(request.get("display"), Some(&ParameterValue::Integer(1)));
        assert_eq!(request.get("start"), Some(&ParameterValue::Integer(1)));
        assert_eq!(request.get("sort").and_then(ParameterValue::as_str), Some("random"));
    }

    #[test]
    fn local_display_above_five_is_out_of_range() {
        assert_eq!(
            check("local", &[("query", "cafe"), ("display", "10")]),
            Err(ValidationError::ParameterOutOfRange {
                key: "display",
                min: 1,
                max: 5
            })
        );
    }

    #[parameterized(name = { "news", "blog", "image", "shop", "kin", "local" })]
    fn integer_bounds_are_inclusive(name: &str) {
        use pretty_assertions::assert_eq;
        let spec = endpoint(name);
        for rule in &spec.rules {
            let ParameterKind::Integer(bounds) = &rule.kind else {
                continue;
            };
            let (min, max) = (*bounds.start(), *bounds.end());

            for accepted in [min, max] {
                let request = validate(
                    &spec,
                    &raw(&[("query", "q"), (rule.key, accepted.to_string().as_str())]),
                )
                .expect("boundary values are accepted");
                assert_eq!(request.get(rule.key), Some(&ParameterValue::Integer(accepted)));
            }

            for rejected in [min - 1, max + 1] {
                assert_eq!(
                    validate(
                        &spec,
                        &raw(&[("query", "q"), (rule.key, rejected.to_string().as_str())])
                    ),
                    Err(ValidationError::ParameterOutOfRange {
                        key: rule.key,
                        min,
                        max
                    })
                );
            }
        }
    }

    #[parameterized(name = { "news", "blog", "image", "shop", "kin", "local" })]
    fn enumerated_values_are_checked(name: &str) {
        use pretty_assertions::assert_eq;
        let spec = endpoint(name);
        for rule in &spec.rules {
            let ParameterKind::Enumerated(allowed) = rule.kind else {
                continue;
            };

            for value in allowed {
                let request = validate(&spec, &raw(&[("query", "q"), (rule.key, *value)]))
                    .expect("allowed values are accepted");
                assert_eq!(request.get(rule.key).and_then(ParameterValue::as_str), Some(*value));
            }

            for value in ["", "SIM", "bogus"] {
                assert_eq!(
                    validate(&spec, &raw(&[("query", "q"), (rule.key, value)])),
                    Err(ValidationError::InvalidParameterValue {
                        key: rule.key,
                        allowed
                    })
                );
            }
        }
    }

    #[parameterized(value = { "ten", "1.5", "", "0x10", "99999999999999999999" })]
    fn non_integers_are_a_type_error(value: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(
            check("news", &[("query", "q"), ("start", value)]),
            Err(ValidationError::InvalidParameterType("start"))
        );
    }

    #[test]
    fn shop_filters_are_free_text() {
        let request = check(
            "shop",
            &[
                ("query", "shoes"),
                ("filter", "naverpay"),
                ("exclude", "used:rental"),
            ],
        )
        .unwrap();
        assert_eq!(request.get("filter").and_then(ParameterValue::as_str), Some("naverpay"));
        assert_eq!(
            request.get("exclude").and_then(ParameterValue::as_str),
            Some("used:rental")
        );
    }

    #[test]
    fn shop_filters_are_omitted_when_absent() {
        let request = check("shop", &[("query", "shoes")]).unwrap();
        assert!(!request.contains_key("filter"));
        assert!(!request.contains_key("exclude"));
        assert_eq!(request.keys().collect::<Vec<_>>(), vec!["query", "display", "start", "sort"]);
    }

    #[test]
    fn empty_shop_filters_are_omitted() {
        let request = check("shop", &[("query", "shoes"), ("filter", ""), ("exclude", "")]).unwrap();
        assert!(!request.contains_key("filter"));
        assert!(!request.contains_key("exclude"));
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"query":"shoes","display":10,"start":1,"sort":"sim"}"#
        );
    }

    #[test]
    fn empty_query_is_kept() {
        let request = check("news", &[("query", "")]).unwrap();
        assert_eq!(request.get("query").and_then(ParameterValue::as_str), Some(""));
    }

    #[test]
    fn image_filter_is_enumerated() {
        assert_eq!(
            check("image", &[("query", "cat"), ("filter", "naverpay")]),
            Err(ValidationError::InvalidParameterValue {
                key: "filter",
                allowed: &["all", "large", "medium", "small"]
            })
        );
        let request = check("image", &[("query", "cat")]).unwrap();
        assert_eq!(request.get("filter").and_then(ParameterValue::as_str), Some("all"));
    }

    #[test]
    fn first_failing_rule_wins() {
        assert_eq!(
            check("news", &[("display", "0"), ("sort", "bogus")]),
            Err(ValidationError::MissingRequiredParameter("query"))
        );
        assert_eq!(
            check("news", &[("query", "q"), ("start", "0"), ("display", "x")]),
            Err(ValidationError::InvalidParameterType("display"))
        );
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let request = check("kin", &[("query", "q"), ("filter", "all"), ("page", "2")]).unwrap();
        assert!(!request.contains_key("filter"));
        assert!(!request.contains_key("page"));
        assert_eq!(request.len(), 4);
    }

    #[test]
    fn text_is_passed_through_unchanged() {
        let request = check("blog", &[("query", "  러스트 & rust  ")]).unwrap();
        assert_eq!(
            request.get("query").and_then(ParameterValue::as_str),
            Some("  러스트 & rust  ")
        );
    }

    #[test]
    fn serializes_in_rule_order() {
        let request = check("news", &[("sort", "date"), ("query", "ai")]).unwrap();
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"query":"ai","display":10,"start":1,"sort":"date"}"#
        );
    }
}
