//! Immutable routing-key → webhook endpoint table.

use std::collections::HashMap;

/// Error parsing a routing table definition.
#[derive(Debug, thiserror::Error)]
#[error("Invalid webhook route '{0}' (expected key=url)")]
pub struct RouteParseError(pub String);

/// Maps routing keys (test plan names) to webhook URLs, with a fallback.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct WebhookRoutes {
    default: Option<String>,
    routes: HashMap<String, String>,
}

impl WebhookRoutes {
    pub fn new(default: Option<String>, routes: HashMap<String, String>) -> Self {
        Self {
            default: default.filter(|url| !url.trim().is_empty()),
            routes,
        }
    }

    /// Parse `key=url;key=url`. Only the first `=` of an item splits, so
    /// URLs may carry query strings.
    pub fn parse(default: Option<String>, table: &str) -> Result<Self, RouteParseError> {
        let mut routes = HashMap::new();
        for item in table.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, url) = item
                .split_once('=')
                .ok_or_else(|| RouteParseError(item.to_string()))?;
            let (key, url) = (key.trim(), url.trim());
            if key.is_empty() || url.is_empty() {
                return Err(RouteParseError(item.to_string()));
            }
            routes.insert(key.to_string(), url.to_string());
        }
        Ok(Self::new(default, routes))
    }

    /// Endpoint for `key`, falling back to the default endpoint.
    pub fn resolve(&self, key: Option<&str>) -> Option<&str> {
        key.and_then(|k| self.routes.get(k))
            .or(self.default.as_ref())
            .map(String::as_str)
    }

    /// Whether `key` has a dedicated endpoint.
    pub fn has_route(&self, key: &str) -> bool {
        self.routes.contains_key(key)
    }
}
