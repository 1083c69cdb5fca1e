//! Conversion entry points.
//!
//! [`convert_file`] is what the HTTP handler calls: it runs one backend
//! between two paths and owns the dispatcher-level logging. Two wrappers sit
//! on top of it:
//!
//! * [`convert_to_file`] writes to a user-chosen path (the `convert`
//!   subcommand). The backend works on a staging file beside the target, so
//!   a failed run never touches what is already there.
//! * [`convert_bytes`] serves library users that hold the PDF in memory; its
//!   temporary files live in a [`tempfile::TempDir`] and are gone when it
//!   returns.

use crate::backend::{BackendKind, Backends};
use crate::error::GatewayError;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Convert `input` (a PDF) to `output` (a PPTX) with the backend `kind`.
///
/// # Errors
/// Returns [`GatewayError::ConversionFailed`] carrying the backend's
/// [`crate::error::ConversionFailure`]. The failure is logged here with its
/// full detail; callers only need to report it.
pub async fn convert_file(
    backends: &Backends,
    kind: BackendKind,
    input: &Path,
    output: &Path,
) -> Result<(), GatewayError> {
    let start = Instant::now();
    info!(backend = %kind, "Converting {}", input.display());

    match backends.get(kind).convert(input, output).await {
        Ok(()) => {
            info!(
                backend = %kind,
                duration_ms = start.elapsed().as_millis() as u64,
                "Conversion finished: {}",
                output.display()
            );
            Ok(())
        }
        Err(source) => {
            error!(
                backend = %kind,
                kind = %source.kind(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Conversion failed: {}",
                source
            );
            Err(GatewayError::ConversionFailed {
                backend: kind,
                source,
            })
        }
    }
}

/// Convert `input` into `output`, replacing `output` only on success.
///
/// # Errors
/// Same as [`convert_file`], plus [`GatewayError::DeliveryFailed`] when the
/// finished presentation cannot be moved onto `output`.
pub async fn convert_to_file(
    backends: &Backends,
    kind: BackendKind,
    input: &Path,
    output: &Path,
) -> Result<(), GatewayError> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // Dropped (and deleted) on every early return.
    let staging = tempfile::Builder::new()
        .prefix(".pdf2pptx_")
        .suffix(".pptx")
        .tempfile_in(parent)
        .map_err(|e| {
            GatewayError::Internal(format!("cannot stage output in {}: {e}", parent.display()))
        })?;

    convert_file(backends, kind, input, staging.path()).await?;

    staging
        .persist(output)
        .map_err(|e| GatewayError::DeliveryFailed {
            path: output.to_path_buf(),
            source: e.error,
        })?;
    Ok(())
}

/// Convert an in-memory PDF and return the presentation bytes.
pub async fn convert_bytes(
    backends: &Backends,
    kind: BackendKind,
    pdf: &[u8],
) -> Result<Vec<u8>, GatewayError> {
    if pdf.is_empty() {
        return Err(GatewayError::EmptyUpload);
    }

    let workdir = tempfile::Builder::new()
        .prefix("pdf2pptx_")
        .tempdir()
        .map_err(|e| GatewayError::Internal(format!("cannot create temp dir: {e}")))?;
    let input = workdir.path().join("input.pdf");
    let output = workdir.path().join("input.pptx");

    tokio::fs::write(&input, pdf)
        .await
        .map_err(|e| GatewayError::Internal(format!("cannot write {}: {e}", input.display())))?;

    convert_file(backends, kind, &input, &output).await?;

    tokio::fs::read(&output)
        .await
        .map_err(|source| GatewayError::DeliveryFailed {
            path: output.clone(),
            source,
        })
}
