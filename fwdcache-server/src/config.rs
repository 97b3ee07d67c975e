use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::ProxyMode;
use crate::upstream::FetcherConfig;

/// Configuration load/validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main server configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: Server,
    pub proxy: ProxyConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Target resolution strategy
    pub mode: ProxyMode,
    /// Upstream request timeout in seconds (default: 10)
    pub fetch_timeout_secs: u64,
    /// Upper bound on a buffered upstream body; unbounded when absent
    pub max_body_bytes: Option<usize>,
    /// User-Agent sent upstream; reqwest sends none when absent
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses (default: 10)
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`
    pub format: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::default(),
            fetch_timeout_secs: 10,
            max_body_bytes: None,
            user_agent: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the proxy cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.proxy.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "proxy.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.proxy.max_body_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "proxy.max_body_bytes must be positive when set".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                other
            ))),
        }
    }

    /// Convert to FetcherConfig
    pub fn to_fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: Duration::from_secs(self.proxy.fetch_timeout_secs),
            max_body_bytes: self.proxy.max_body_bytes,
            user_agent: self.proxy.user_agent.clone(),
        }
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_observed_behaviour() {
        let config = ServerConfig::default();

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.proxy.fetch_timeout_secs, 10);
        assert_eq!(config.proxy.max_body_bytes, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: ServerConfig = serde_yaml::from_str(
            r#"
proxy:
  mode: embedded
cache:
  capacity: 64
"#,
        )
        .unwrap();

        assert_eq!(config.proxy.mode, ProxyMode::Embedded);
        assert_eq!(config.proxy.fetch_timeout_secs, 10);
        assert_eq!(config.cache.capacity, 64);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  host: 127.0.0.1\n  port: 9000\nproxy:\n  mode: self-url\n  max_body_bytes: 1048576\nlogging:\n  level: debug\n  format: json"
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();

        assert_eq!(config.server_addr(), "127.0.0.1:9000");
        assert_eq!(config.proxy.mode, ProxyMode::SelfUrl);
        assert_eq!(config.proxy.max_body_bytes, Some(1_048_576));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_from_file_missing() {
        let result = ServerConfig::from_file("/nonexistent/fwdcache.yml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = ServerConfig::default();
        config.cache.capacity = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = ServerConfig::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_to_fetcher_config() {
        let mut config = ServerConfig::default();
        config.proxy.fetch_timeout_secs = 3;
        config.proxy.max_body_bytes = Some(512);

        let fetcher = config.to_fetcher_config();
        assert_eq!(fetcher.timeout, Duration::from_secs(3));
        assert_eq!(fetcher.max_body_bytes, Some(512));
    }
}
