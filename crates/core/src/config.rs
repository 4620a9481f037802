//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:4929").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum payload body size in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,
}

fn default_bind() -> String {
    "127.0.0.1:4929".to_string()
}

fn default_max_payload_size() -> usize {
    512 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_payload_size: default_max_payload_size(),
        }
    }
}

/// Lease store backend selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LeaseDbConfig {
    /// In-memory store. Leases do not survive a restart.
    Memory,
    /// Embedded SQLite store.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for LeaseDbConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/leases.db"),
        }
    }
}

/// Top-level gateway configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Lease lifetime in seconds.
    #[serde(default = "default_max_lease_time_secs")]
    pub max_lease_time_secs: u64,
    /// Worker pool size.
    #[serde(default = "default_num_receivers")]
    pub num_receivers: usize,
    /// Receiver executable spawned per task.
    #[serde(default = "default_receiver_path")]
    pub receiver_path: PathBuf,
    /// Use the in-process mock receiver instead of spawning processes.
    #[serde(default)]
    pub mock_receiver: bool,
    /// Key and repository access policy file.
    #[serde(default = "default_access_config_file")]
    pub access_config_file: PathBuf,
    /// Lease store backend.
    #[serde(default)]
    pub lease_db: LeaseDbConfig,
}

fn default_max_lease_time_secs() -> u64 {
    7200 // 2 hours
}

fn default_num_receivers() -> usize {
    4
}

fn default_receiver_path() -> PathBuf {
    PathBuf::from("/usr/bin/sluice_receiver")
}

fn default_access_config_file() -> PathBuf {
    PathBuf::from("/etc/sluice/repo.json")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            max_lease_time_secs: default_max_lease_time_secs(),
            num_receivers: default_num_receivers(),
            receiver_path: default_receiver_path(),
            mock_receiver: false,
            access_config_file: default_access_config_file(),
            lease_db: LeaseDbConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Get the lease lifetime as a Duration.
    pub fn max_lease_time(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.max_lease_time_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Create a test configuration: mock receiver, in-memory store.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            mock_receiver: true,
            num_receivers: 2,
            lease_db: LeaseDbConfig::Memory,
            ..Default::default()
        }
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_receivers == 0 {
            return Err(crate::Error::Config(
                "num_receivers must be at least 1".to_string(),
            ));
        }
        if self.max_lease_time_secs == 0 {
            return Err(crate::Error::Config(
                "max_lease_time_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        GatewayConfig::default().validate().unwrap();
        GatewayConfig::for_testing().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let config = GatewayConfig {
            num_receivers: 0,
            ..GatewayConfig::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_lease_time() {
        let config = GatewayConfig {
            max_lease_time_secs: 90,
            ..GatewayConfig::for_testing()
        };
        assert_eq!(config.max_lease_time(), Duration::seconds(90));
    }
}
