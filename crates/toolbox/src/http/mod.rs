//! HTTP surface for the toolbox server.
//!
//! Routes:
//! - `/shells/:name[/:lport | /:lhost/:lport]`: rendered payload templates
//! - `/debug/*namespace?value=<base64>`: logs a beacon and answers 200
//! - everything else: the file serving engine
//!
//! File serving runs on the blocking pool so slow reads never hold up the
//! async workers.

pub mod render;

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::{Config, ConfigError};
use crate::files::{FileServingEngine, ServeError, ServerResponse};
use crate::payloads::{PayloadError, PayloadGenerator};

pub use render::{escape_html, render_listing};

/// Errors returned to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Nothing to serve at this path.
    #[error("not found")]
    NotFound,

    /// Method not supported on this path.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Malformed request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the log.
        let body = match &self {
            HttpError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}

impl From<PayloadError> for HttpError {
    fn from(err: PayloadError) -> Self {
        HttpError::BadRequest(err.to_string())
    }
}

impl From<ServeError> for HttpError {
    fn from(err: ServeError) -> Self {
        HttpError::Internal(err.to_string())
    }
}

/// Shared handler state.
///
/// The engine sits behind a lock only so it can be swapped wholesale;
/// handlers clone the `Arc` and drop the lock before serving.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RwLock<Arc<FileServingEngine>>>,
    payloads: Arc<PayloadGenerator>,
}

impl AppState {
    /// Create handler state.
    pub fn new(engine: FileServingEngine, payloads: PayloadGenerator) -> Self {
        Self {
            engine: Arc::new(RwLock::new(Arc::new(engine))),
            payloads: Arc::new(payloads),
        }
    }

    /// Snapshot of the current engine.
    pub async fn engine(&self) -> Arc<FileServingEngine> {
        Arc::clone(&*self.engine.read().await)
    }

    /// Payload generator.
    pub fn payloads(&self) -> &PayloadGenerator {
        &self.payloads
    }

    /// Swap in a new engine. In-flight requests keep their snapshot.
    pub async fn replace_engine(&self, engine: FileServingEngine) {
        *self.engine.write().await = Arc::new(engine);
    }

    /// Rebuild the engine from `config` and swap it in.
    ///
    /// On error the current engine stays active.
    pub async fn reload(&self, config: &Config) -> Result<(), ConfigError> {
        let engine = FileServingEngine::from_config(config)?;
        self.replace_engine(engine).await;
        info!("Reloaded alias registry");
        Ok(())
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shells/:name", get(shell))
        .route("/shells/:name/:lport", get(shell_with_port))
        .route("/shells/:name/:lhost/:lport", get(shell_with_host))
        .route("/debug/", get(debug_root))
        .route("/debug/*namespace", get(debug_namespace))
        .fallback(serve_path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

// =========================================================================
// File Handlers
// =========================================================================

async fn serve_path(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response, HttpError> {
    if method != Method::GET && method != Method::HEAD && method != Method::POST {
        return Err(HttpError::MethodNotAllowed);
    }

    let requested = decode_request_path(uri.path());
    let engine = state.engine().await;

    let response = tokio::task::spawn_blocking(move || engine.serve(&requested))
        .await
        .map_err(|e| {
            error!(error = %e, "File serving task failed");
            HttpError::Internal(e.to_string())
        })??;

    match response {
        ServerResponse::InvalidPath => Err(HttpError::NotFound),
        ServerResponse::FileResult { content, .. } => {
            Ok(([(header::CONTENT_TYPE, "text/plain")], content).into_response())
        }
        ServerResponse::DirectoryListing(listing) => {
            Ok(Html(render_listing(&listing, state.payloads())).into_response())
        }
    }
}

/// Strip the leading `/` and percent-decode.
fn decode_request_path(path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

// =========================================================================
// Payload Handlers
// =========================================================================

async fn shell(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    render_payload(&state, &name, None, None, &headers)
}

async fn shell_with_port(
    State(state): State<AppState>,
    Path((name, lport)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    render_payload(&state, &name, None, Some(&lport), &headers)
}

async fn shell_with_host(
    State(state): State<AppState>,
    Path((name, lhost, lport)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    render_payload(&state, &name, Some(&lhost), Some(&lport), &headers)
}

fn render_payload(
    state: &AppState,
    name: &str,
    lhost: Option<&str>,
    lport: Option<&str>,
    headers: &HeaderMap,
) -> Result<Response, HttpError> {
    let srvhost_url = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("http://{}/", host))
        .unwrap_or_default();

    debug!(name, ?lhost, ?lport, "Rendering payload");

    match state.payloads().generate(name, lhost, lport, &srvhost_url)? {
        Some(payload) => Ok(([(header::CONTENT_TYPE, "text/plain")], payload).into_response()),
        None => Err(HttpError::NotFound),
    }
}

// =========================================================================
// Debug Handlers
// =========================================================================

#[derive(Debug, Deserialize)]
struct DebugQuery {
    value: Option<String>,
}

async fn debug_root(Query(query): Query<DebugQuery>) -> StatusCode {
    log_beacon("", query.value)
}

async fn debug_namespace(
    Path(namespace): Path<String>,
    Query(query): Query<DebugQuery>,
) -> StatusCode {
    log_beacon(&namespace, query.value)
}

fn log_beacon(namespace: &str, value: Option<String>) -> StatusCode {
    let value = value.map(|raw| decode_beacon_value(&raw));
    info!(namespace, value = value.as_deref().unwrap_or(""), "Debug beacon");
    StatusCode::OK
}

/// Base64-decode a beacon value, falling back to the raw text.
pub fn decode_beacon_value(raw: &str) -> String {
    match STANDARD.decode(raw) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => format!("Unknown base: {}", raw),
    }
}
