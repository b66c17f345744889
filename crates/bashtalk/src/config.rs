//! Server configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. [`ServerConfig::default`]
//! 2. an optional JSON file named by `BASHTALK_CONFIG`
//! 3. individual environment overrides (`BASHTALK_HOST`, `BASHTALK_PORT`,
//!    `BASHTALK_MAX_CLIENTS`, `BASHTALK_MAX_CACHE_SIZE`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 9898;

/// Errors raised while loading configuration. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for [`ServerConfig`].
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An override or field has an unusable value.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    /// No admin password was configured and none could be prompted for.
    #[error("no administrator password available")]
    MissingPassword,
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum simultaneous connections, pending handshakes included.
    pub max_clients: usize,

    /// Number of chat lines replayed to newcomers.
    pub max_cache_size: usize,

    /// How long a password challenge waits for the reply.
    pub password_timeout_secs: u64,

    /// Hex SHA-256 of the admin password. When absent the executable
    /// asks for the password instead.
    pub admin_password_sha256: Option<String>,

    /// Default log filter, used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_clients: bashtalk_session::DEFAULT_MAX_SESSIONS,
            max_cache_size: bashtalk_cache::DEFAULT_CAPACITY,
            password_timeout_secs: 30,
            admin_password_sha256: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads the config file named by `BASHTALK_CONFIG` (if set), then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("BASHTALK_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json(&text)
    }

    /// Parses a JSON config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies `BASHTALK_*` overrides fetched through `lookup`.
    ///
    /// Taking a lookup function instead of reading the environment
    /// directly keeps this testable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BASHTALK_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("BASHTALK_PORT") {
            self.port = parse_value("BASHTALK_PORT", &port)?;
        }
        if let Some(max) = lookup("BASHTALK_MAX_CLIENTS") {
            self.max_clients = parse_value("BASHTALK_MAX_CLIENTS", &max)?;
        }
        if let Some(max) = lookup("BASHTALK_MAX_CACHE_SIZE") {
            self.max_cache_size = parse_value("BASHTALK_MAX_CACHE_SIZE", &max)?;
        }
        Ok(())
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_clients".into(),
                value: "0".into(),
            });
        }
        if self.password_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "password_timeout_secs".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// `host:port`, ready for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The password challenge timeout as a `Duration`.
    pub fn password_timeout(&self) -> Duration {
        Duration::from_secs(self.password_timeout_secs)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_matches_protocol_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9898);
        assert_eq!(config.max_clients, 50);
        assert_eq!(config.max_cache_size, 100);
        assert_eq!(config.bind_addr(), "0.0.0.0:9898");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_fills_defaults() {
        let config =
            ServerConfig::from_json(r#"{ "port": 4000, "max_clients": 3 }"#)
                .expect("valid json");
        assert_eq!(config.port, 4000);
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.max_cache_size, 100);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_from_json_malformed_returns_parse_error() {
        let err = ServerConfig::from_json("{ port: }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file_missing_returns_read_error() {
        let err = ServerConfig::from_file("/definitely/not/here.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_apply_overrides_sets_fields() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(env(&[
                ("BASHTALK_HOST", "127.0.0.1"),
                ("BASHTALK_PORT", "7000"),
                ("BASHTALK_MAX_CACHE_SIZE", " 10 "),
            ]))
            .expect("valid overrides");
        assert_eq!(config.bind_addr(), "127.0.0.1:7000");
        assert_eq!(config.max_cache_size, 10);
        assert_eq!(config.max_clients, 50);
    }

    #[test]
    fn test_apply_overrides_bad_number_returns_invalid_value() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_overrides(env(&[("BASHTALK_PORT", "ninety")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BASHTALK_PORT")
        );
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = ServerConfig {
            max_clients: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_timeout_converts_seconds() {
        let config = ServerConfig {
            password_timeout_secs: 5,
            ..ServerConfig::default()
        };
        assert_eq!(config.password_timeout(), Duration::from_secs(5));
    }
}
