//! Node server: HTTP front end, RPC endpoint and bootstrap

pub mod http;
pub mod node;

pub use http::{create_router, AppState};
pub use node::Node;
