//! Reverse route resolution for registered endpoints.
//!
//! Endpoints are registered once at startup under a stable identifier; the
//! registry resolves that identifier (plus route values) back into a concrete
//! URL, e.g. for `Location` headers. Lookup is a plain map access over the
//! same `{param}` / `{*rest}` template syntax the dispatch router matches.

use std::collections::{BTreeMap, HashMap};

use http::Method;

use crate::config_error;
use crate::core::{SendError, SendResult};

/// One route template served by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: Method,
    pub template: String,
}

impl RouteSpec {
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
        }
    }
}

/// Chooses among an endpoint's routes during reverse resolution.
///
/// `Any` only resolves when the endpoint has exactly one route; endpoints
/// with several routes must be disambiguated by verb or route index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSelector {
    Any,
    Verb(Method),
    Index(usize),
}

/// Startup-populated map from endpoint identifier to its route templates.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    routes: HashMap<String, Vec<RouteSpec>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint's routes under its identifier.
    pub fn register(&mut self, name: &str, routes: &[RouteSpec]) -> SendResult<()> {
        if routes.is_empty() {
            return Err(config_error!("endpoint '{}' declares no routes", name));
        }
        if self.routes.contains_key(name) {
            return Err(config_error!("endpoint '{}' is already registered", name));
        }
        self.routes.insert(name.to_string(), routes.to_vec());
        Ok(())
    }

    /// Returns the registered templates for an endpoint, if any.
    pub fn routes(&self, name: &str) -> Option<&[RouteSpec]> {
        self.routes.get(name).map(|specs| specs.as_slice())
    }

    /// Resolves an endpoint identifier into a concrete URL.
    ///
    /// Fails with `RouteResolution` when the endpoint is unknown, the
    /// selector does not pick exactly one route, or a template value is
    /// missing from `values`.
    pub fn resolve(
        &self,
        target: &str,
        selector: &RouteSelector,
        values: &BTreeMap<String, String>,
    ) -> SendResult<String> {
        let specs = self.routes.get(target).ok_or_else(|| {
            SendError::RouteResolution(format!("unknown endpoint '{target}'"))
        })?;

        let spec = match selector {
            RouteSelector::Any => {
                if specs.len() == 1 {
                    &specs[0]
                } else {
                    return Err(SendError::RouteResolution(format!(
                        "endpoint '{target}' has {} routes, select one by verb or index",
                        specs.len()
                    )));
                }
            }
            RouteSelector::Verb(method) => {
                specs.iter().find(|s| s.method == *method).ok_or_else(|| {
                    SendError::RouteResolution(format!(
                        "endpoint '{target}' has no {method} route"
                    ))
                })?
            }
            RouteSelector::Index(idx) => specs.get(*idx).ok_or_else(|| {
                SendError::RouteResolution(format!(
                    "endpoint '{target}' has no route at index {idx}"
                ))
            })?,
        };

        fill_template(target, &spec.template, values)
    }
}

/// Substitutes `{param}` and `{*rest}` segments with the supplied values.
fn fill_template(
    target: &str,
    template: &str,
    values: &BTreeMap<String, String>,
) -> SendResult<String> {
    let mut url = String::with_capacity(template.len());

    for segment in template.split('/') {
        if segment.is_empty() {
            continue;
        }
        url.push('/');
        match parse_param(segment) {
            Some(name) => match values.get(name) {
                Some(value) => url.push_str(value),
                None => {
                    return Err(SendError::RouteResolution(format!(
                        "endpoint '{target}' route '{template}' needs a value for '{name}'"
                    )))
                }
            },
            None => url.push_str(segment),
        }
    }

    if url.is_empty() {
        url.push('/');
    }
    Ok(url)
}

/// Parameter name of a `{name}` / `{*name}` segment, or `None` for literals.
fn parse_param(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    Some(inner.strip_prefix('*').unwrap_or(inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample_registry() -> EndpointRegistry {
        let mut registry = EndpointRegistry::new();
        registry
            .register(
                "users.get",
                &[RouteSpec::new(Method::GET, "/users/{id}")],
            )
            .unwrap();
        registry
            .register(
                "reports.range",
                &[
                    RouteSpec::new(Method::GET, "/reports/{year}"),
                    RouteSpec::new(Method::GET, "/reports/{year}/{month}"),
                    RouteSpec::new(Method::DELETE, "/reports/{year}"),
                ],
            )
            .unwrap();
        registry
            .register(
                "assets.get",
                &[RouteSpec::new(Method::GET, "/assets/{*path}")],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_single_route() {
        let registry = sample_registry();
        let url = registry
            .resolve("users.get", &RouteSelector::Any, &values(&[("id", "42")]))
            .unwrap();
        assert_eq!(url, "/users/42");
    }

    #[test]
    fn test_resolve_catch_all() {
        let registry = sample_registry();
        let url = registry
            .resolve(
                "assets.get",
                &RouteSelector::Any,
                &values(&[("path", "css/site.css")]),
            )
            .unwrap();
        assert_eq!(url, "/assets/css/site.css");
    }

    #[test]
    fn test_ambiguous_without_selector() {
        let registry = sample_registry();
        let err = registry
            .resolve(
                "reports.range",
                &RouteSelector::Any,
                &values(&[("year", "2024")]),
            )
            .unwrap_err();
        assert!(matches!(err, SendError::RouteResolution(_)));
    }

    #[test]
    fn test_selector_by_verb_and_index() {
        let registry = sample_registry();
        let url = registry
            .resolve(
                "reports.range",
                &RouteSelector::Verb(Method::DELETE),
                &values(&[("year", "2024")]),
            )
            .unwrap();
        assert_eq!(url, "/reports/2024");

        let url = registry
            .resolve(
                "reports.range",
                &RouteSelector::Index(1),
                &values(&[("year", "2024"), ("month", "05")]),
            )
            .unwrap();
        assert_eq!(url, "/reports/2024/05");
    }

    #[test]
    fn test_unknown_endpoint_and_missing_value() {
        let registry = sample_registry();
        assert!(matches!(
            registry.resolve("nope", &RouteSelector::Any, &BTreeMap::new()),
            Err(SendError::RouteResolution(_))
        ));
        assert!(matches!(
            registry.resolve("users.get", &RouteSelector::Any, &BTreeMap::new()),
            Err(SendError::RouteResolution(_))
        ));
    }

    #[test]
    fn test_selector_out_of_range() {
        let registry = sample_registry();
        assert!(matches!(
            registry.resolve(
                "users.get",
                &RouteSelector::Verb(Method::POST),
                &values(&[("id", "42")])
            ),
            Err(SendError::RouteResolution(_))
        ));
        assert!(matches!(
            registry.resolve(
                "users.get",
                &RouteSelector::Index(5),
                &values(&[("id", "42")])
            ),
            Err(SendError::RouteResolution(_))
        ));
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty() {
        let mut registry = EndpointRegistry::new();
        registry
            .register("users.get", &[RouteSpec::new(Method::GET, "/users/{id}")])
            .unwrap();
        assert!(matches!(
            registry.register("users.get", &[RouteSpec::new(Method::GET, "/u/{id}")]),
            Err(SendError::Configuration(_))
        ));
        assert!(matches!(
            registry.register("empty", &[]),
            Err(SendError::Configuration(_))
        ));
    }
}
