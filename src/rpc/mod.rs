//! Remote calls between proxies and the master
//!
//! A call is a named method (`Store.Get` / `Store.Put`), one string argument
//! and a reply that carries either a result or an error. Any transport that
//! implements [`RemoteCallChannel`] can carry it; [`client::HttpChannel`] and
//! [`server::rpc_router`] provide the JSON-over-HTTP one.

pub mod client;
pub mod server;

pub use client::HttpChannel;
pub use server::rpc_router;

use crate::common::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Path of the RPC endpoint
pub const RPC_PATH: &str = "/rpc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "Store.Get")]
    Get,
    #[serde(rename = "Store.Put")]
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "Store.Get",
            Method::Put => "Store.Put",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: Method,
    pub arg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    NotFound,
    BadRequest,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcFault {
    pub kind: FaultKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub reply: Option<String>,
    pub error: Option<RpcFault>,
}

impl RpcResponse {
    pub fn ok(reply: String) -> Self {
        Self {
            reply: Some(reply),
            error: None,
        }
    }

    pub fn fault(err: &Error) -> Self {
        let kind = match err {
            Error::NotFound(_) => FaultKind::NotFound,
            Error::InvalidTarget(_) | Error::InvalidConfig(_) => FaultKind::BadRequest,
            _ => FaultKind::Internal,
        };
        Self {
            reply: None,
            error: Some(RpcFault {
                kind,
                message: err.to_string(),
            }),
        }
    }

    pub fn into_result(self, method: Method) -> Result<String> {
        match (self.reply, self.error) {
            (_, Some(fault)) => Err(match fault.kind {
                FaultKind::NotFound => Error::NotFound(fault.message),
                FaultKind::BadRequest => Error::InvalidTarget(fault.message),
                FaultKind::Internal => Error::Remote {
                    method: method.to_string(),
                    message: fault.message,
                },
            }),
            (Some(reply), None) => Ok(reply),
            (None, None) => Err(Error::Internal(format!("{} returned an empty reply", method))),
        }
    }
}

/// Carries named store calls to a remote node.
///
/// A call either completes with a reply or fails; a call that never returns
/// must be bounded by the implementation.
#[async_trait]
pub trait RemoteCallChannel: Send + Sync {
    async fn call(&self, method: Method, arg: &str) -> Result<String>;
}

#[async_trait]
impl<T: RemoteCallChannel + ?Sized> RemoteCallChannel for Arc<T> {
    async fn call(&self, method: Method, arg: &str) -> Result<String> {
        (**self).call(method, arg).await
    }
}
