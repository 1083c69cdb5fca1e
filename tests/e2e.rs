//! End-to-end tests against real converters.
//!
//! These tests run a real LibreOffice (and, when credentials are present, the
//! CloudConvert sandbox). They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Optional:
//!   SOFFICE_PATH=/Applications/LibreOffice.app/Contents/MacOS/soffice
//!   CLOUDCONVERT_API_KEY=...   (sandbox key)

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use pdf2pptx_gateway::{
    build_router, convert_bytes, AppState, BackendKind, Backends, GatewayConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A one-page PDF with a single line of text.
const HELLO_PDF: &str = "%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
  /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj
4 0 obj << /Length 44 >> stream
BT /F1 24 Tf 72 700 Td (Hello slides) Tj ET
endstream endobj
5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

fn live_config(root: &std::path::Path) -> Arc<GatewayConfig> {
    let mut builder = GatewayConfig::builder()
        .upload_dir(root.join("uploads"))
        .output_dir(root.join("outputs"));
    if let Ok(soffice) = std::env::var("SOFFICE_PATH") {
        builder = builder.soffice_path(soffice);
    }
    if let Ok(key) = std::env::var("CLOUDCONVERT_API_KEY") {
        builder = builder.cloudconvert_api_key(key).cloudconvert_sandbox(true);
    }
    Arc::new(builder.build().unwrap())
}

/// Every .pptx is a zip archive.
fn assert_pptx(bytes: &[u8], context: &str) {
    assert!(bytes.len() > 1000, "[{context}] suspiciously small: {} bytes", bytes.len());
    assert_eq!(&bytes[..4], b"PK\x03\x04", "[{context}] not a zip container");
}

// ── LibreOffice ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_libreoffice_convert_bytes() {
    e2e_skip_unless_enabled!();
    let root = tempfile::tempdir().unwrap();
    let config = live_config(root.path());
    let backends = Backends::from_config(&config).unwrap();

    let pptx = convert_bytes(&backends, BackendKind::LibreOffice, HELLO_PDF.as_bytes())
        .await
        .unwrap();
    assert_pptx(&pptx, "libreoffice/bytes");
    std::fs::write(output_dir().join("hello_libreoffice.pptx"), &pptx).unwrap();
}

#[tokio::test]
async fn test_libreoffice_over_http() {
    e2e_skip_unless_enabled!();
    let root = tempfile::tempdir().unwrap();
    let config = live_config(root.path());
    std::fs::create_dir_all(&config.upload_dir).unwrap();
    std::fs::create_dir_all(&config.output_dir).unwrap();
    let backends = Backends::from_config(&config).unwrap();
    let server =
        TestServer::new(build_router(AppState::new(Arc::clone(&config), backends))).unwrap();

    let response = server
        .post("/convert/libreoffice")
        .multipart(MultipartForm::new().add_part(
            "file",
            Part::bytes(HELLO_PDF.as_bytes().to_vec()).file_name("hello.pdf"),
        ))
        .await;
    response.assert_status_ok();
    assert_pptx(response.as_bytes(), "libreoffice/http");

    assert_eq!(std::fs::read_dir(&config.upload_dir).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
}

// ── CloudConvert sandbox ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_cloudconvert_sandbox() {
    e2e_skip_unless_enabled!();
    if std::env::var("CLOUDCONVERT_API_KEY").is_err() {
        println!("SKIP: set CLOUDCONVERT_API_KEY to a sandbox key");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let config = live_config(root.path());
    let backends = Backends::from_config(&config).unwrap();

    let pptx = convert_bytes(&backends, BackendKind::CloudConvert, HELLO_PDF.as_bytes())
        .await
        .unwrap();
    assert_pptx(&pptx, "cloudconvert/sandbox");
    std::fs::write(output_dir().join("hello_cloudconvert.pptx"), &pptx).unwrap();
}
