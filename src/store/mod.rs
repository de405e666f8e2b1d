//! Store implementations
//!
//! - [`LocalStore`]: the in-memory mapping, durable when opened on a log file
//! - [`DurableLog`]: append-only persistence replayed at startup
//!
//! Both the master's local store and a proxy implement [`Store`], which is all
//! the HTTP front end and the RPC endpoint ever see.

pub mod durable_log;
pub mod local;

pub use durable_log::{DurableLog, LogOptions};
pub use local::LocalStore;

use crate::common::{NodeRole, Result};
use async_trait::async_trait;

/// Get/Put contract shared by the master store and proxies.
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve a code. `Ok(None)` when the code is unknown.
    async fn get(&self, code: &str) -> Result<Option<String>>;

    /// Assign a new code to `target`.
    async fn put(&self, target: &str) -> Result<String>;

    /// Entries held locally
    fn count(&self) -> usize;

    fn role(&self) -> NodeRole;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
