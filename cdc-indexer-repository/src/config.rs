//! Connection configuration for the OpenSearch document store.

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Configuration for connecting to OpenSearch.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// The OpenSearch server URL (e.g., "http://localhost:9200").
    pub url: String,
    /// Basic auth username (enables basic auth if set together with `password`).
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OPENSEARCH_URL)
    }
}

impl OpenSearchConfig {
    /// Create a config for an unauthenticated cluster.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Set basic auth credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// The credentials pair, when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenSearchConfig::default();
        assert_eq!(config.url, DEFAULT_OPENSEARCH_URL);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let mut config = OpenSearchConfig::new("http://search:9200");
        config.username = Some("admin".to_string());
        assert!(config.credentials().is_none());

        let config = config.with_credentials("admin".to_string(), "secret".to_string());
        assert_eq!(config.credentials(), Some(("admin", "secret")));
    }
}
