//! Error types for the pdf2pptx gateway.
//!
//! Two distinct error types reflect the two layers of the gateway:
//!
//! * [`GatewayError`]: what the HTTP caller sees. Each variant maps to one
//!   status code and one user-safe, single-line message. The full detail of
//!   the underlying cause is logged server-side and never serialised into the
//!   response body.
//!
//! * [`ConversionFailure`]: what a backend reports. Every backend reduces its
//!   remote-API, HTTP and subprocess errors to this one type at its own
//!   boundary, so the route handler never sees a backend-specific error.

use crate::backend::BackendKind;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    // ── Input errors (400) ────────────────────────────────────────────────
    /// The multipart body has no part named `file`.
    #[error("No file part found in the request.")]
    MissingFilePart,

    /// The `file` part carries an empty filename.
    #[error("No file selected.")]
    EmptyFilename,

    /// The filename does not end in `.pdf` (case-insensitive).
    #[error("Invalid file type, please upload a PDF file.")]
    UnsupportedFileType { filename: String },

    /// The `file` part has a valid name but zero bytes of content.
    #[error("The uploaded file is empty.")]
    EmptyUpload,

    /// The body could not be parsed as `multipart/form-data`.
    #[error("Malformed multipart request: {0}")]
    MalformedMultipart(String),

    // ── Size errors (413) ─────────────────────────────────────────────────
    /// The request body exceeded `max_upload_bytes`.
    #[error("The uploaded file exceeds the maximum allowed size.")]
    UploadTooLarge,

    // ── Routing errors (404) ──────────────────────────────────────────────
    /// The `{backend}` path segment names no known backend.
    #[error("Unknown conversion backend '{0}'.")]
    UnknownBackend(String),

    // ── Backend errors (500) ──────────────────────────────────────────────
    /// The selected backend reported a failure.
    #[error("Conversion with the {backend} backend failed: {source}")]
    ConversionFailed {
        backend: BackendKind,
        #[source]
        source: ConversionFailure,
    },

    // ── Delivery errors (500) ─────────────────────────────────────────────
    /// Conversion succeeded but the produced file could not be read back or
    /// moved into place.
    #[error("Failed to deliver converted file '{path}': {source}")]
    DeliveryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all (500) ───────────────────────────────────────────────────
    /// Unexpected internal error (e.g. the upload could not be written).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingFilePart
            | GatewayError::EmptyFilename
            | GatewayError::UnsupportedFileType { .. }
            | GatewayError::EmptyUpload
            | GatewayError::MalformedMultipart(_) => StatusCode::BAD_REQUEST,
            GatewayError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UnknownBackend(_) => StatusCode::NOT_FOUND,
            GatewayError::ConversionFailed { .. }
            | GatewayError::DeliveryFailed { .. }
            | GatewayError::InvalidConfig(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe message, without leaking backend or filesystem detail.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::MalformedMultipart(_) => {
                "Malformed request, expected multipart/form-data with a 'file' field.".to_string()
            }
            GatewayError::ConversionFailed { backend, .. } => format!(
                "Conversion failed with the {backend} backend, please check the server logs."
            ),
            GatewayError::DeliveryFailed { .. } => {
                "The file was converted but could not be sent.".to_string()
            }
            GatewayError::InvalidConfig(_) | GatewayError::Internal(_) => {
                "Internal server error, please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            // Already logged with full detail by `convert_file`.
            GatewayError::ConversionFailed { backend, source } => {
                tracing::debug!(backend = %backend, kind = %source.kind(), "Responding with conversion failure");
            }
            GatewayError::DeliveryFailed { .. }
            | GatewayError::InvalidConfig(_)
            | GatewayError::Internal(_) => {
                tracing::error!("Internal gateway error: {}", self);
            }
            GatewayError::UnknownBackend(_) => {
                tracing::debug!("Routing error: {}", self);
            }
            _ => {
                tracing::info!("Rejected upload: {}", self);
            }
        }

        let body = serde_json::json!({ "error": self.user_message() });
        (self.status_code(), Json(body)).into_response()
    }
}

/// Coarse classification of a [`ConversionFailure`], used as a log field.
///
/// The subprocess backend distinguishes a timeout and a missing executable
/// from every other failure; all remaining variants are `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ExecutableNotFound,
    Generic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ExecutableNotFound => "executable-not-found",
            FailureKind::Generic => "generic",
        })
    }
}

/// A failed backend conversion.
#[derive(Debug, Error)]
pub enum ConversionFailure {
    // ── Configuration ─────────────────────────────────────────────────────
    /// Credentials for a cloud backend were not supplied at start-up.
    #[error("{backend} backend is not configured: {hint}")]
    NotConfigured { backend: BackendKind, hint: String },

    // ── Remote services ───────────────────────────────────────────────────
    /// The remote service rejected a request.
    #[error("Service API error during {stage} (HTTP {status}): {message}")]
    ServiceApi {
        stage: &'static str,
        status: u16,
        message: String,
    },

    /// The remote service answered HTTP 429: quota or rate limit exhausted.
    #[error("Service usage limit reached during {stage}: {message}")]
    UsageLimit { stage: &'static str, message: String },

    /// Transport-level failure talking to a remote service.
    #[error("HTTP request failed during {stage}: {source}")]
    Http {
        stage: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The remote service answered with a body we could not interpret.
    #[error("Unexpected response during {stage}: {detail}")]
    MalformedResponse { stage: &'static str, detail: String },

    /// The remote job reached a failed terminal state.
    #[error("Remote job failed: {detail}")]
    JobFailed { detail: String },

    /// The remote job did not reach a terminal state within the local ceiling.
    #[error("Remote job did not finish within {after:?}")]
    JobTimeout { after: Duration },

    /// The finished export task listed no result files.
    #[error("Export task finished without producing any files")]
    NoExportFiles,

    /// The synchronous conversion call returned no files.
    #[error("Conversion call returned no output files")]
    NoOutputFiles,

    // ── Local subprocess ──────────────────────────────────────────────────
    /// The office-suite executable could not be found.
    #[error("Executable '{path}' not found; install LibreOffice or set SOFFICE_PATH")]
    ExecutableNotFound { path: PathBuf },

    /// The subprocess ran past its wall-clock budget and was killed.
    #[error("Subprocess timed out after {after:?}")]
    Timeout { after: Duration },

    /// The subprocess exited with a nonzero status.
    #[error("Subprocess exited with status {code:?}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The subprocess exited cleanly but the expected file is missing or empty.
    #[error("No output produced at '{path}'")]
    NoOutputProduced { path: PathBuf },

    // ── Local I/O ─────────────────────────────────────────────────────────
    /// A local filesystem operation failed.
    #[error("I/O error while trying to {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConversionFailure::Timeout { .. } | ConversionFailure::JobTimeout { .. } => {
                FailureKind::Timeout
            }
            ConversionFailure::ExecutableNotFound { .. } => FailureKind::ExecutableNotFound,
            _ => FailureKind::Generic,
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionFailure::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
