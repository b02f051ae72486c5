//! Configuration for the tracing engine.
//!
//! Provides serde-based configuration with:
//! - YAML file support
//! - Environment variable overrides
//! - Validation and defaults

use crate::core::error::{Result, SpanlineError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the tracing engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Whether tracing is active; when false the tracer is not constructed
    pub enabled: bool,
    /// Collector endpoint receiving Zipkin v2 span batches
    pub collector_url: String,
    /// Service name reported as the local endpoint of every span
    pub local_service_name: String,
    /// Upper bound on a single collector flush
    #[serde(with = "humantime_serde")]
    pub flush_timeout: Duration,
    /// Database dependency settings consumed by database spans
    pub database: DatabaseConfig,
    /// Cache dependency settings consumed by cache spans
    pub cache: CacheConfig,
    /// Object-storage dependency settings consumed by storage spans
    pub storage: StorageConfig,
}

/// Database connection settings used for span tag derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database server hostname
    pub hostname: String,
    /// Database server port
    pub port: u16,
    /// Schema assumed for unqualified table references
    pub schema: String,
}

/// Cache server settings used for span tag derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache server hostname
    pub host: String,
    /// Cache server port
    pub port: u16,
}

/// Object-storage settings used for span tag derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// CDN base URL, preferred over `url` when present
    pub cdn: Option<String>,
    /// Storage base URL
    pub url: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collector_url: "http://127.0.0.1:9411/api/v2/spans".to_string(),
            local_service_name: "api".to_string(),
            flush_timeout: Duration::from_secs(5),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 3306,
            schema: "app".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cdn: None,
            url: "http://storage.local".to_string(),
        }
    }
}

impl StorageConfig {
    /// Returns the host the instrumented storage client reports as its
    /// remote endpoint: the CDN when configured, otherwise the base URL,
    /// with the scheme stripped.
    pub fn host(&self) -> String {
        let url = self.cdn.as_deref().unwrap_or(&self.url);
        url.trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string()
    }
}

impl TracingConfig {
    /// Loads configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TracingConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variable overrides on top of the loaded values
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(enabled) = std::env::var("SPANLINE_ENABLED") {
            self.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(url) = std::env::var("SPANLINE_COLLECTOR_URL") {
            self.collector_url = url;
        }
        if let Ok(name) = std::env::var("SPANLINE_SERVICE_NAME") {
            self.local_service_name = name;
        }
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.collector_url.is_empty() {
            return Err(SpanlineError::config("collector_url cannot be empty"));
        }
        if !self.collector_url.starts_with("http://") && !self.collector_url.starts_with("https://")
        {
            return Err(SpanlineError::config(format!(
                "collector_url must be an http(s) URL, got {:?}",
                self.collector_url
            )));
        }
        if self.local_service_name.is_empty() {
            return Err(SpanlineError::config("local_service_name cannot be empty"));
        }
        if self.flush_timeout.is_zero() {
            return Err(SpanlineError::config("flush_timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TracingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collector_url, "http://127.0.0.1:9411/api/v2/spans");
        assert_eq!(config.database.schema, "app");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
collector_url: "http://zipkin:9411/api/v2/spans"
local_service_name: "checkout"
database:
  schema: "shop"
"#;
        let config: TracingConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.local_service_name, "checkout");
        assert_eq!(config.database.schema, "shop");
        assert_eq!(config.cache.port, 6379);
    }

    #[test]
    fn test_empty_collector_url_rejected_when_enabled() {
        let config = TracingConfig {
            collector_url: String::new(),
            ..TracingConfig::default()
        };
        assert!(config.validate().is_err());

        let disabled = TracingConfig {
            enabled: false,
            collector_url: String::new(),
            ..TracingConfig::default()
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_non_http_collector_url_rejected() {
        let config = TracingConfig {
            collector_url: "zipkin:9411".to_string(),
            ..TracingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_win() {
        std::env::set_var("SPANLINE_COLLECTOR_URL", "http://other:9411/api/v2/spans");
        std::env::set_var("SPANLINE_ENABLED", "false");
        let config = TracingConfig::default().apply_env_overrides();
        std::env::remove_var("SPANLINE_COLLECTOR_URL");
        std::env::remove_var("SPANLINE_ENABLED");

        assert_eq!(config.collector_url, "http://other:9411/api/v2/spans");
        assert!(!config.enabled);
    }

    #[test]
    fn test_storage_host_prefers_cdn_and_strips_scheme() {
        let storage = StorageConfig {
            cdn: Some("https://cdn.example.com/".to_string()),
            url: "http://bucket.example.com".to_string(),
        };
        assert_eq!(storage.host(), "cdn.example.com");

        let no_cdn = StorageConfig {
            cdn: None,
            url: "http://bucket.example.com".to_string(),
        };
        assert_eq!(no_cdn.host(), "bucket.example.com");
    }
}
