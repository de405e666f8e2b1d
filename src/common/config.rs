//! Configuration for linkstore nodes

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix (`LINKSTORE_HTTP_ADDR`, `LINKSTORE_MASTER_ADDR`, ...)
pub const ENV_PREFIX: &str = "LINKSTORE";

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bind address for the HTTP front end (and RPC endpoint)
    pub http_addr: SocketAddr,

    /// Host name used when rendering short links
    pub hostname: String,

    /// Durable log path (master mode only)
    pub data_file: PathBuf,

    /// Expose `Store.Get` / `Store.Put` over RPC
    pub rpc_enabled: bool,

    /// RPC address of the master; set only on proxy nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_addr: Option<String>,

    /// When the log writer forces records to stable storage
    pub sync_policy: SyncPolicy,

    /// Capacity of the durability queue
    pub log_queue_capacity: usize,

    /// Maximum entries held by a proxy cache (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_capacity: Option<usize>,

    /// Upper bound on a single call to the master
    pub rpc_timeout_ms: u64,

    /// Logging level
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Master,
    Proxy,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::Proxy => write!(f, "proxy"),
        }
    }
}

/// Durable log sync policy
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// fsync after every record
    Always,
    /// fsync once the queue has been drained
    #[default]
    Batch,
    /// flush to the OS, never fsync
    Never,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            hostname: "localhost:8080".to_string(),
            data_file: PathBuf::from("store.log"),
            rpc_enabled: false,
            master_addr: None,
            sync_policy: SyncPolicy::default(),
            log_queue_capacity: 1024,
            cache_capacity: None,
            rpc_timeout_ms: 5_000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then `LINKSTORE_*`
    /// environment variables. Missing keys keep their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "log_queue_capacity must be positive".into(),
            ));
        }
        if self.cache_capacity == Some(0) {
            return Err(Error::InvalidConfig(
                "cache_capacity must be positive when set".into(),
            ));
        }
        if matches!(self.master_addr.as_deref(), Some(addr) if addr.trim().is_empty()) {
            return Err(Error::InvalidConfig("master_addr is empty".into()));
        }
        Ok(())
    }

    pub fn role(&self) -> NodeRole {
        if self.master_addr.is_some() {
            NodeRole::Proxy
        } else {
            NodeRole::Master
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.role(), NodeRole::Master);
        assert_eq!(config.sync_policy, SyncPolicy::Batch);
        assert_eq!(config.http_addr.port(), 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
hostname = "sho.rt"
master_addr = "http://10.0.0.1:8080"
sync_policy = "always"
cache_capacity = 500
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.hostname, "sho.rt");
        assert_eq!(config.role(), NodeRole::Proxy);
        assert_eq!(config.sync_policy, SyncPolicy::Always);
        assert_eq!(config.cache_capacity, Some(500));
        // untouched keys keep defaults
        assert_eq!(config.log_queue_capacity, 1024);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = Config {
            log_queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            cache_capacity: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            master_addr: Some("  ".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sync_policy_from_flag() {
        use clap::ValueEnum;
        assert_eq!(SyncPolicy::from_str("never", false).unwrap(), SyncPolicy::Never);
        assert_eq!(SyncPolicy::from_str("ALWAYS", true).unwrap(), SyncPolicy::Always);
        assert!(SyncPolicy::from_str("sometimes", false).is_err());
    }
}
