//! The catalog of search endpoints the gateway exposes.

use crate::{
    error::SetupError,
    rules::{EndpointSpec, ParameterRule},
};
use std::collections::HashSet;

/// Sort orders accepted by the news and blog resources.
const SORT_SIM_DATE: &[&str] = &["sim", "date"];
/// Size filters accepted by the image resource.
const IMAGE_FILTERS: &[&str] = &["all", "large", "medium", "small"];
/// Sort orders accepted by the shopping resource.
const SHOP_SORTS: &[&str] = &["sim", "date", "asc", "dsc"];
/// Sort orders accepted by the knowledge-base resource.
const KIN_SORTS: &[&str] = &["sim", "date", "point"];
/// Sort orders accepted by the local business resource.
const LOCAL_SORTS: &[&str] = &["random", "comment"];

/// The immutable set of endpoints, built once at start up and shared by
/// every request.
#[derive(Clone, Debug)]
pub struct EndpointCatalog {
    /// The endpoints, in the order they were given.
    endpoints: Vec<EndpointSpec>,
}

impl EndpointCatalog {
    /// Build a catalog from `endpoints`, checking that endpoint names and the
    /// parameter keys of each endpoint are unique, and that every default is
    /// a value its rule would accept.
    ///
    /// # Errors
    /// Returns [`SetupError::InvalidCatalog`] describing the first problem found.
    pub fn new(endpoints: Vec<EndpointSpec>) -> Result<Self, SetupError> {
        let mut names = HashSet::new();
        for endpoint in &endpoints {
            if !names.insert(endpoint.name) {
                return Err(SetupError::InvalidCatalog(format!(
                    "endpoint `{}` is defined more than once",
                    endpoint.name
                )));
            }

            let mut keys = HashSet::new();
            for rule in &endpoint.rules {
                if !keys.insert(rule.key) {
                    return Err(SetupError::InvalidCatalog(format!(
                        "parameter `{}` is defined more than once for `{}`",
                        rule.key, endpoint.name
                    )));
                }
                if let Some(default) = &rule.default {
                    if !rule.admits(default) {
                        return Err(SetupError::InvalidCatalog(format!(
                            "default `{}` for `{}` on `{}` is not an accepted value",
                            default, rule.key, endpoint.name
                        )));
                    }
                }
            }
        }

        Ok(Self { endpoints })
    }

    /// The six Naver search categories.
    ///
    /// # Errors
    /// Only if the tables below break a catalog invariant.
    pub fn naver() -> Result<Self, SetupError> {
        Self::new(vec![
            naver_endpoint("news", paging(100), vec![sort(SORT_SIM_DATE, "sim")]),
            naver_endpoint("blog", paging(100), vec![sort(SORT_SIM_DATE, "sim")]),
            naver_endpoint(
                "image",
                paging(100),
                vec![
                    sort(SORT_SIM_DATE, "sim"),
                    ParameterRule::enumerated("filter", IMAGE_FILTERS, "all"),
                ],
            ),
            naver_endpoint(
                "shop",
                paging(100),
                vec![
                    sort(SHOP_SORTS, "sim"),
                    ParameterRule::optional_text("filter"),
                    ParameterRule::optional_text("exclude"),
                ],
            ),
            naver_endpoint("kin", paging(100), vec![sort(KIN_SORTS, "sim")]),
            naver_endpoint(
                "local",
                vec![
                    ParameterRule::integer("display", 1..=5, 1),
                    ParameterRule::integer("start", 1..=1, 1),
                ],
                vec![sort(LOCAL_SORTS, "random")],
            ),
        ])
    }

    /// Look up an endpoint by its inbound name.
    pub fn get(&self, name: &str) -> Option<&EndpointSpec> {
        self.endpoints.iter().find(|endpoint| endpoint.name == name)
    }

    /// Iterate over all endpoints.
    pub fn iter(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.endpoints.iter()
    }
}

/// An endpoint with a required `query`, followed by `paging` and `extra` rules.
fn naver_endpoint(
    name: &'static str,
    paging: Vec<ParameterRule>,
    extra: Vec<ParameterRule>,
) -> EndpointSpec {
    let mut rules = vec![ParameterRule::required_text("query")];
    rules.extend(paging);
    rules.extend(extra);
    EndpointSpec {
        name,
        upstream_path: name,
        upstream_suffix: ".json",
        rules,
    }
}

/// The usual `display` and `start` rules.
fn paging(max_display: i64) -> Vec<ParameterRule> {
    vec![
        ParameterRule::integer("display", 1..=max_display, 10),
        ParameterRule::integer("start", 1..=1000, 1),
    ]
}

/// A `sort` rule.
fn sort(allowed: &'static [&'static str], default: &'static str) -> ParameterRule {
    ParameterRule::enumerated("sort", allowed, default)
}
