//! HTTP surface of the gateway.
//!
//! ## Routes
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET`  | `/` | plain-text banner |
//! | `POST` | `/convert` | convert with the configured default backend |
//! | `POST` | `/convert/{backend}` | convert with `adobe`, `cloudconvert`, `convertapi` or `libreoffice` |
//!
//! Handlers share no mutable state: [`AppState`] holds the read-only config
//! and the backend table, and every request works on its own
//! [`RequestFiles`].

use crate::backend::{BackendKind, Backends};
use crate::config::GatewayConfig;
use crate::convert::convert_file;
use crate::error::GatewayError;
use crate::pipeline::workspace::{self, RequestFiles};
use crate::pipeline::{delivery, upload};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Instrument, Level};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub backends: Backends,
}

impl AppState {
    pub fn new(config: Arc<GatewayConfig>, backends: Backends) -> Self {
        Self { config, backends }
    }
}

/// Build the router with body limit, CORS and request tracing applied.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/convert", post(convert_default))
        .route("/convert/{backend}", post(convert_with))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn index() -> &'static str {
    "PDF to PPTX conversion gateway.\n\
     POST a PDF as multipart field 'file' to one of:\n  \
     /convert/adobe\n  \
     /convert/cloudconvert\n  \
     /convert/convertapi\n  \
     /convert/libreoffice\n"
}

async fn convert_default(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GatewayError> {
    let kind = state.config.default_backend;
    handle_conversion(state, kind, multipart).await
}

async fn convert_with(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GatewayError> {
    let kind: BackendKind = backend
        .parse()
        .map_err(|_| GatewayError::UnknownBackend(backend.clone()))?;
    handle_conversion(state, kind, multipart).await
}

/// validate → save → convert → send; `files` removes both paths when dropped.
async fn handle_conversion(
    state: AppState,
    kind: BackendKind,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GatewayError> {
    let mut multipart = multipart.map_err(|e| GatewayError::MalformedMultipart(e.body_text()))?;
    let upload = upload::read_upload(&mut multipart).await?;

    let files = RequestFiles::new(&state.config);
    let span = tracing::info_span!("request", id = %files.id(), backend = %kind);

    async {
        tokio::fs::write(files.input(), &upload.bytes)
            .await
            .map_err(|e| {
                GatewayError::Internal(format!("cannot save {}: {e}", files.input().display()))
            })?;
        info!("Saved '{}' as {}", upload.filename, files.input().display());

        convert_file(&state.backends, kind, files.input(), files.output()).await?;
        delivery::respond(files.output(), &upload.filename).await
    }
    .instrument(span)
    .await
}

/// Prepare directories, purge orphans, and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = Arc::clone(&state.config);
    workspace::ensure_dirs(&config).await?;
    workspace::purge_stale_files(
        &[config.upload_dir.as_path(), config.output_dir.as_path()],
        config.stale_file_age(),
    )
    .await;

    let listener = TcpListener::bind(config.bind).await?;
    info!(
        "Gateway listening on http://{} (default backend: {})",
        listener.local_addr()?,
        config.default_backend
    );
    for kind in BackendKind::ALL {
        if !config.is_configured(kind) {
            info!("Backend '{}' is not configured; requests to it will fail", kind);
        }
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Gateway stopped");
    Ok(())
}
