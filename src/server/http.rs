//! HTTP front end
//!
//! - `GET /{code}` redirects to the stored target
//! - `GET|POST /add` stores a target (form field or query `url`) and answers
//!   with the short link, or renders the add form when `url` is empty
//! - `GET /health`, `GET /metrics`
//! - `POST /rpc` when RPC is enabled

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Result, METRICS};
use crate::rpc::rpc_router;
use crate::store::Store;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

const MAX_BODY_BYTES: usize = 64 * 1024;

const ADD_FORM: &str = r#"<form method="POST" action="/add">
URL: <input type="text" name="url">
<input type="submit" value="Add">
</form>
"#;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Host used when rendering short links
    pub hostname: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddParams {
    #[serde(default)]
    pub url: Option<String>,
}

pub fn create_router(state: AppState, rpc_enabled: bool) -> Router {
    let store = state.store.clone();

    let mut router = Router::new()
        .route("/", get(add_query))
        .route("/add", get(add_query).post(add_form))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/:code", get(redirect))
        .with_state(state);

    if rpc_enabled {
        router = router.merge(rpc_router(store));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(request_tracing_middleware))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    )
}

fn error_response(err: Error) -> Response {
    (err.to_http_status(), err.to_string()).into_response()
}

/// Accept only absolute http(s) URLs as redirect targets.
pub fn validate_target(url: &str) -> Result<()> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| Error::InvalidTarget(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidTarget(format!(
            "unsupported scheme {:?} in {}",
            other, url
        ))),
    }
}

async fn redirect(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    METRICS.gets.inc();
    match state.store.get(&code).await {
        Ok(Some(url)) => {
            tracing::debug!(code = %code, url = %url, "Redirecting");
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Ok(None) => {
            METRICS.not_found.inc();
            error_response(Error::NotFound(code))
        }
        Err(e) => error_response(e),
    }
}

async fn add_query(State(state): State<AppState>, Query(params): Query<AddParams>) -> Response {
    add(&state, params.url).await
}

async fn add_form(State(state): State<AppState>, Form(params): Form<AddParams>) -> Response {
    add(&state, params.url).await
}

async fn add(state: &AppState, url: Option<String>) -> Response {
    let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) else {
        return Html(ADD_FORM).into_response();
    };

    if let Err(e) = validate_target(&url) {
        return error_response(e);
    }

    match state.store.put(&url).await {
        Ok(code) => {
            tracing::info!(code = %code, "Added target");
            format!("http://{}/{}", state.hostname, code).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "role": state.store.role().to_string(),
        "entries": state.store.count(),
        "version": crate::VERSION,
    }))
}

async fn metrics() -> impl IntoResponse {
    (StatusCode::OK, METRICS.to_prometheus())
}
