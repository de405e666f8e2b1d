//! # linkstore
//!
//! A short-code store for URLs:
//! - Durable append-only log, replayed on restart
//! - Concurrent put/get behind a single reader/writer lock
//! - One master assigns codes; proxies cache reads and forward writes
//! - JSON-over-HTTP RPC between nodes, HTTP redirect front end
//!
//! ## Architecture
//!
//! ```text
//!  clients ──HTTP──┐            ┌──HTTP── clients
//!                  ▼            ▼
//!            ┌──────────┐  ┌──────────┐
//!            │ Proxy A  │  │ Proxy B  │   cache, read-through / write-through
//!            └────┬─────┘  └────┬─────┘
//!                 │ Store.Get   │ Store.Put
//!                 └──────┬──────┘
//!                        ▼
//!                 ┌─────────────┐
//!                 │   Master    │   authoritative mapping
//!                 │  + log file │
//!                 └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a master
//! ```bash
//! linkstore serve --http 0.0.0.0:8080 --file ./store.log --rpc
//! ```
//!
//! ### Start a proxy
//! ```bash
//! linkstore serve --http 0.0.0.0:8081 --host proxy.example:8081 --master localhost:8080
//! ```
//!
//! ### Use the CLI
//! ```bash
//! linkstore-cli --node http://localhost:8080 put https://www.rust-lang.org
//! linkstore-cli --node http://localhost:8080 get a
//! ```

pub mod common;
pub mod proxy;
pub mod rpc;
pub mod server;
pub mod store;

pub use common::{Config, Error, Result};
pub use proxy::ReplicaProxy;
pub use server::Node;
pub use store::{LocalStore, Store};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
