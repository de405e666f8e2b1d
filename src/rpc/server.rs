//! RPC endpoint exposing a node's store

use crate::common::{Error, METRICS};
use crate::rpc::{Method, RpcRequest, RpcResponse, RPC_PATH};
use crate::store::Store;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

/// Router serving `Store.Get` / `Store.Put` for `store`.
pub fn rpc_router(store: Arc<dyn Store>) -> Router {
    Router::new()
        .route(RPC_PATH, post(handle_call))
        .with_state(store)
}

async fn handle_call(
    State(store): State<Arc<dyn Store>>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    let RpcRequest { method, arg } = request;

    let result = match method {
        Method::Get => {
            METRICS.gets.inc();
            match store.get(&arg).await {
                Ok(Some(url)) => Ok(url),
                Ok(None) => {
                    METRICS.not_found.inc();
                    Err(Error::NotFound(arg))
                }
                Err(e) => Err(e),
            }
        }
        Method::Put => store.put(&arg).await,
    };

    Json(match result {
        Ok(reply) => RpcResponse::ok(reply),
        Err(e) => {
            if !e.is_not_found() {
                tracing::warn!(method = %method, "RPC call failed: {}", e);
            }
            RpcResponse::fault(&e)
        }
    })
}
