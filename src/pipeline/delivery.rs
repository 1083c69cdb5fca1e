//! Attachment response for a converted presentation.
//!
//! The download name is derived from the client's filename: final path
//! component, trailing `.pdf` removed, `.pptx` appended. `Content-Disposition`
//! carries both a quoted ASCII fallback and an RFC 5987 `filename*` with the
//! exact UTF-8 name.

use crate::error::GatewayError;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// MIME type of an Office Open XML presentation.
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const DEFAULT_STEM: &str = "document";

/// The uploaded name without directories or its `.pdf` suffix.
pub fn download_stem(filename: &str) -> &str {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let len = base.len();
    let stem = if len >= 4
        && base.is_char_boundary(len - 4)
        && base[len - 4..].eq_ignore_ascii_case(".pdf")
    {
        &base[..len - 4]
    } else {
        base
    };
    if stem.is_empty() {
        DEFAULT_STEM
    } else {
        stem
    }
}

/// `<stem>.pptx` for the given upload name.
pub fn download_filename(filename: &str) -> String {
    format!("{}.pptx", download_stem(filename))
}

/// `attachment; filename="<ascii>"; filename*=UTF-8''<pct-encoded>`.
pub fn content_disposition(download_name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(download_name),
        percent_encode(download_name)
    )
}

fn ascii_fallback(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

// RFC 5987 attr-char.
fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len() * 3);
    for b in name.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => out.push(b as char),
            _ => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}

/// Read the converted file fully and build the 200 attachment response.
pub async fn respond(output: &Path, uploaded_name: &str) -> Result<Response, GatewayError> {
    let bytes = tokio::fs::read(output)
        .await
        .map_err(|source| GatewayError::DeliveryFailed {
            path: output.to_path_buf(),
            source,
        })?;

    let download_name = download_filename(uploaded_name);
    let disposition = HeaderValue::from_str(&content_disposition(&download_name))
        .map_err(|e| GatewayError::Internal(format!("invalid Content-Disposition: {e}")))?;

    info!("Sending '{}' ({} bytes)", download_name, bytes.len());
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PPTX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn stem_strips_pdf_suffix() {
        assert_eq!(download_filename("quarterly.pdf"), "quarterly.pptx");
        assert_eq!(download_filename("Quarterly.PDF"), "Quarterly.pptx");
        assert_eq!(download_filename("my.report.pdf"), "my.report.pptx");
    }

    #[test]
    fn stem_drops_directories() {
        assert_eq!(download_stem("../../etc/passwd.pdf"), "passwd");
        assert_eq!(download_stem("C:\\Users\\me\\deck.pdf"), "deck");
    }

    #[test]
    fn empty_stem_becomes_document() {
        assert_eq!(download_filename(".pdf"), "document.pptx");
        assert_eq!(download_filename("dir/"), "document.pptx");
    }

    #[test]
    fn disposition_has_ascii_and_utf8_forms() {
        let value = content_disposition("Résumé \"final\".pptx");
        assert_eq!(
            value,
            "attachment; filename=\"R_sum_ _final_.pptx\"; \
             filename*=UTF-8''R%C3%A9sum%C3%A9%20%22final%22.pptx"
        );
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[tokio::test]
    async fn respond_sets_headers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.pptx");
        std::fs::write(&out, b"PK\x03\x04").unwrap();

        let response = respond(&out, "slides.pdf").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PPTX_MIME);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap();
        assert!(disposition.contains("filename=\"slides.pptx\""), "{disposition}");
    }

    #[tokio::test]
    async fn missing_output_is_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = respond(&dir.path().join("gone.pptx"), "a.pdf").await.unwrap_err();
        assert!(matches!(err, GatewayError::DeliveryFailed { .. }));
    }
}
