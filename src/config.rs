//! Configuration management for reqlimit.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{ReqlimitError, Result};
use crate::ratelimit::LimitConfig;

/// Prefix of environment variables overriding settings, e.g.
/// `REQLIMIT__LIMITING__MAX_REQUESTS=100`.
pub const ENV_PREFIX: &str = "REQLIMIT";

/// Main configuration for the reqlimit server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReqlimitConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Request limiting configuration
    #[serde(default)]
    pub limiting: LimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Request limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitingConfig {
    /// Requests allowed per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Seconds a stale record is kept before reclamation (defaults to one window)
    #[serde(default)]
    pub retention_secs: Option<u64>,

    /// Reclamation interval in seconds, 0 disables it
    #[serde(default = "default_reclaim_interval")]
    pub reclaim_interval_secs: u64,
}

impl Default for LimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            retention_secs: None,
            reclaim_interval_secs: default_reclaim_interval(),
        }
    }
}

fn default_max_requests() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_reclaim_interval() -> u64 {
    60
}

impl ReqlimitConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ReqlimitError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from an optional YAML file, overridden by
    /// `REQLIMIT__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build the validated limits the middleware enforces.
    pub fn limits(&self) -> Result<LimitConfig> {
        let limiting = &self.limiting;
        let window = Duration::from_secs(limiting.window_secs);

        let mut limits = LimitConfig::new(limiting.max_requests, window)?
            .with_reclaim_interval(Some(Duration::from_secs(limiting.reclaim_interval_secs)));

        if let Some(retention) = limiting.retention_secs {
            limits = limits.with_retention(Duration::from_secs(retention));
        }

        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReqlimitConfig::default();
        assert_eq!(config.server.listen_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.limiting.max_requests, 10);
        assert_eq!(config.limiting.window_secs, 60);

        let limits = config.limits().unwrap();
        assert_eq!(limits.max_requests, 10);
        assert_eq!(limits.window, Duration::from_secs(60));
        assert_eq!(limits.retention, Duration::from_secs(60));
        assert_eq!(limits.reclaim_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  listen_addr: 0.0.0.0:9000
limiting:
  max_requests: 100
  window_secs: 5
  retention_secs: 30
  reclaim_interval_secs: 0
"#;
        let config = ReqlimitConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);

        let limits = config.limits().unwrap();
        assert_eq!(limits.max_requests, 100);
        assert_eq!(limits.window, Duration::from_secs(5));
        assert_eq!(limits.retention, Duration::from_secs(30));
        assert_eq!(limits.reclaim_interval, None);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = ReqlimitConfig::from_yaml("limiting:\n  max_requests: 3\n").unwrap();
        assert_eq!(config.limiting.max_requests, 3);
        assert_eq!(config.limiting.window_secs, 60);
        assert_eq!(config.server.listen_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ReqlimitConfig::from_yaml("limiting: [not, a, map]");
        assert!(matches!(result, Err(ReqlimitError::Config(_))));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = ReqlimitConfig::default();
        config.limiting.max_requests = 0;
        assert!(matches!(config.limits(), Err(ReqlimitError::InvalidLimit(_))));

        let mut config = ReqlimitConfig::default();
        config.limiting.window_secs = 0;
        assert!(matches!(config.limits(), Err(ReqlimitError::InvalidLimit(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = ReqlimitConfig::load(Some(Path::new("/nonexistent/reqlimit.yaml")));
        assert!(matches!(result, Err(ReqlimitError::Settings(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("reqlimit-{}.yaml", std::process::id()));
        std::fs::write(&path, "limiting:\n  max_requests: 42\n  window_secs: 7\n").unwrap();

        let config = ReqlimitConfig::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limiting.max_requests, 42);
        assert_eq!(config.limiting.window_secs, 7);
        assert_eq!(config.server.listen_addr.port(), 8080);
    }
}
