//! # Server Configuration
//!
//! JSON configuration loaded once at startup (camelCase field naming).
//! Storages and repositories defined here are handed to
//! [`StorageRegistry`](crate::repository::StorageRegistry) and become
//! immutable for the process lifetime.

use std::path::Path;

use serde::Deserialize;

use crate::repository::Storage;

/// Checksum cache tuning. Both values are milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheConfig {
    /// Interval between background eviction passes.
    #[serde(default = "default_expired_check_interval")]
    pub expired_check_interval: u64,
    /// Age after which a cached digest is considered absent.
    #[serde(default = "default_lifetime")]
    pub lifetime: u64,
}

fn default_expired_check_interval() -> u64 {
    300_000
}

fn default_lifetime() -> u64 {
    60_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expired_check_interval: default_expired_check_interval(),
            lifetime: default_lifetime(),
        }
    }
}

fn default_port() -> u16 {
    48080
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub checksum_cache: CacheConfig,
    pub storages: Vec<Storage>,
}

impl ServerConfig {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Configuration loading failures, reported at startup only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse configuration {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "storages": []
        }))
        .unwrap();
        assert_eq!(config.port, 48080);
        assert_eq!(config.checksum_cache.expired_check_interval, 300_000);
        assert_eq!(config.checksum_cache.lifetime, 60_000);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: ServerConfig = serde_json::from_value(serde_json::json!({
            "port": 9000,
            "checksumCache": { "expiredCheckInterval": 5000, "lifetime": 1000 },
            "storages": []
        }))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.checksum_cache.expired_check_interval, 5000);
        assert_eq!(config.checksum_cache.lifetime, 1000);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<ServerConfig, _> = serde_json::from_value(serde_json::json!({
            "storages": [],
            "replication": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citadel.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "storages": [ {{ "id": "storage0", "basedir": "{}",
                 "repositories": [ {{ "id": "releases" }} ] }} ] }}"#,
            dir.path().join("storage0").display()
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storages.len(), 1);
        assert_eq!(config.storages[0].repositories[0].id, "releases");
    }

    #[test]
    fn load_missing_file_fails() {
        let err = ServerConfig::load(Path::new("/nonexistent/citadel.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ServerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
