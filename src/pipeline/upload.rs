//! Multipart intake: locate the `file` part and validate it.
//!
//! Validation runs in a fixed order and finishes before the upload is written
//! anywhere: missing part, empty filename, wrong extension, empty content.

use crate::error::GatewayError;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use tracing::debug;

/// Name of the multipart field that carries the PDF.
pub const FILE_FIELD: &str = "file";

/// A validated upload held in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    /// The client-supplied filename, as sent.
    pub filename: String,
    pub bytes: Bytes,
}

/// Case-insensitive `.pdf` suffix check.
pub fn is_pdf_filename(filename: &str) -> bool {
    let len = filename.len();
    len >= 4
        && filename.is_char_boundary(len - 4)
        && filename[len - 4..].eq_ignore_ascii_case(".pdf")
}

/// Check the filename of the `file` part.
pub fn validate_filename(filename: &str) -> Result<(), GatewayError> {
    if filename.is_empty() {
        return Err(GatewayError::EmptyFilename);
    }
    if !is_pdf_filename(filename) {
        return Err(GatewayError::UnsupportedFileType {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

/// Read the first `file` part carrying a filename; other fields are skipped.
pub async fn read_upload(multipart: &mut Multipart) -> Result<Upload, GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A part without a filename attribute is a plain form value, not a file.
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Skipping '{}' part without a filename", FILE_FIELD);
            continue;
        };
        validate_filename(&filename)?;

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Err(GatewayError::EmptyUpload);
        }
        debug!("Accepted upload '{}' ({} bytes)", filename, bytes.len());
        return Ok(Upload { filename, bytes });
    }
    Err(GatewayError::MissingFilePart)
}

fn multipart_error(e: MultipartError) -> GatewayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::UploadTooLarge
    } else {
        GatewayError::MalformedMultipart(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_suffix_is_case_insensitive() {
        assert!(is_pdf_filename("slides.pdf"));
        assert!(is_pdf_filename("SLIDES.PDF"));
        assert!(is_pdf_filename("a.Pdf"));
        assert!(!is_pdf_filename("report.txt"));
        assert!(!is_pdf_filename("pdf"));
        assert!(!is_pdf_filename("archive.pdf.zip"));
    }

    #[test]
    fn multibyte_names_do_not_panic() {
        assert!(!is_pdf_filename("é"));
        assert!(!is_pdf_filename("日本語"));
        assert!(is_pdf_filename("日本語.pdf"));
    }

    #[test]
    fn validation_order() {
        assert!(matches!(validate_filename(""), Err(GatewayError::EmptyFilename)));
        assert!(matches!(
            validate_filename("report.txt"),
            Err(GatewayError::UnsupportedFileType { .. })
        ));
        assert!(validate_filename("deck.pdf").is_ok());
    }
}
