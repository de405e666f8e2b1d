//! Common utilities and types shared across linkstore

pub mod config;
pub mod error;
pub mod keygen;
pub mod metrics;
pub mod record;
pub mod tracing_middleware;

pub use config::{Config, NodeRole, SyncPolicy};
pub use error::{Error, Result};
pub use metrics::METRICS;
pub use record::Record;
