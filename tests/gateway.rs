//! HTTP-level tests for the gateway router.
//!
//! The router runs in process through `axum-test`; no port is bound. The
//! local backend is exercised with a fake `soffice` shell script, and the
//! dispatch tests swap in in-memory converters.

mod common;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::*;
use pdf2pptx_gateway::{
    build_router, AppState, BackendKind, Backends, ConversionFailure, Converter, GatewayConfig,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Gateway {
    server: TestServer,
    root: TempDir,
}

impl Gateway {
    fn uploads(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    fn outputs(&self) -> PathBuf {
        self.root.path().join("outputs")
    }

    fn assert_clean(&self) {
        assert_eq!(entries(&self.uploads()), 0, "uploads dir not empty");
        assert_eq!(entries(&self.outputs()), 0, "outputs dir not empty");
    }
}

fn gateway_with(
    customise: impl FnOnce(pdf2pptx_gateway::GatewayConfigBuilder, &Path) -> pdf2pptx_gateway::GatewayConfigBuilder,
    replace: Vec<(BackendKind, Arc<dyn Converter>)>,
) -> Gateway {
    let root = tempfile::tempdir().unwrap();
    let uploads = root.path().join("uploads");
    let outputs = root.path().join("outputs");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::create_dir_all(&outputs).unwrap();

    let builder = GatewayConfig::builder().upload_dir(&uploads).output_dir(&outputs);
    let config = Arc::new(customise(builder, root.path()).build().unwrap());
    let mut backends = Backends::from_config(&config).unwrap();
    for (kind, converter) in replace {
        backends = backends.with_converter(kind, converter);
    }

    let server = TestServer::new(build_router(AppState::new(config, backends))).unwrap();
    Gateway { server, root }
}

#[cfg(unix)]
fn office_gateway(kind: FakeOffice) -> Gateway {
    gateway_with(
        |b, root| b.soffice_path(install_fake_office(root, kind)),
        Vec::new(),
    )
}

fn pdf_form(filename: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(bytes.to_vec()).file_name(filename))
}

/// Writes a fixed presentation and remembers which inputs it saw.
#[derive(Default)]
struct Recording {
    inputs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Converter for Recording {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure> {
        assert!(input.exists(), "input must be saved before conversion");
        self.inputs.lock().unwrap().push(input.to_path_buf());
        tokio::fs::write(output, FAKE_PPTX).await.unwrap();
        Ok(())
    }
}

// ── Routes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn index_lists_conversion_routes() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw.server.get("/").await;
    response.assert_status_ok();
    let text = response.text();
    for kind in BackendKind::ALL {
        assert!(text.contains(&format!("/convert/{kind}")), "banner: {text}");
    }
}

#[tokio::test]
async fn unknown_backend_is_404() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/gimp")
        .multipart(pdf_form("a.pdf", FAKE_PDF))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Unknown conversion backend 'gimp'.");
    gw.assert_clean();
}

#[tokio::test]
async fn default_route_uses_default_backend() {
    let recorder = Arc::new(Recording::default());
    let gw = gateway_with(
        |b, _| b.default_backend(BackendKind::ConvertApi),
        vec![(BackendKind::ConvertApi, recorder.clone() as Arc<dyn Converter>)],
    );
    let response = gw.server.post("/convert").multipart(pdf_form("a.pdf", FAKE_PDF)).await;
    response.assert_status_ok();
    assert_eq!(recorder.inputs.lock().unwrap().len(), 1);
    gw.assert_clean();
}

#[tokio::test]
async fn each_request_gets_distinct_files() {
    let recorder = Arc::new(Recording::default());
    let gw = gateway_with(
        |b, _| b,
        vec![(BackendKind::CloudConvert, recorder.clone() as Arc<dyn Converter>)],
    );
    for _ in 0..2 {
        gw.server
            .post("/convert/cloudconvert")
            .multipart(pdf_form("same-name.pdf", FAKE_PDF))
            .await
            .assert_status_ok();
    }

    let inputs = recorder.inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 2);
    assert_ne!(inputs[0], inputs[1]);
    for input in &inputs {
        let stem = input.file_stem().unwrap().to_str().unwrap();
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(input.extension().unwrap(), "pdf");
        assert_eq!(input.parent().unwrap(), gw.uploads());
    }
    gw.assert_clean();
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_extension_is_rejected_without_touching_disk() {
    let recorder = Arc::new(Recording::default());
    let gw = gateway_with(
        |b, _| b,
        vec![(BackendKind::LibreOffice, recorder.clone() as Arc<dyn Converter>)],
    );
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("report.txt", b"plain text"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid file type, please upload a PDF file.");
    assert!(recorder.inputs.lock().unwrap().is_empty());
    gw.assert_clean();
}

#[tokio::test]
async fn missing_file_part_is_rejected() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(MultipartForm::new().add_text("note", "no file here"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "No file part found in the request.");
}

#[tokio::test]
async fn empty_filename_is_rejected() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("", FAKE_PDF))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "No file selected.");
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("empty.pdf", b""))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "The uploaded file is empty.");
    gw.assert_clean();
}

#[tokio::test]
async fn non_multipart_body_is_rejected() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/libreoffice")
        .json(&serde_json::json!({ "file": "a.pdf" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("multipart"));
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let gw = gateway_with(|b, _| b.max_upload_bytes(1024), Vec::new());
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("big.pdf", &vec![b'x'; 8 * 1024]))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    gw.assert_clean();
}

// ── Backends through HTTP ────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn libreoffice_conversion_returns_attachment() {
    let gw = office_gateway(FakeOffice::Converts);
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("Quarterly Report.pdf", FAKE_PDF))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), PPTX_MIME);
    let disposition = response.header(header::CONTENT_DISPOSITION);
    let disposition = disposition.to_str().unwrap();
    assert!(
        disposition.starts_with("attachment; filename=\"Quarterly Report.pptx\""),
        "{disposition}"
    );
    assert!(disposition.contains("filename*=UTF-8''Quarterly%20Report.pptx"));
    assert_eq!(response.as_bytes().as_ref(), FAKE_PPTX);
    gw.assert_clean();
}

#[cfg(unix)]
#[tokio::test]
async fn uppercase_extension_and_selector_are_accepted() {
    let gw = office_gateway(FakeOffice::Converts);
    let response = gw
        .server
        .post("/convert/LibreOffice")
        .multipart(pdf_form("SCAN.PDF", FAKE_PDF))
        .await;
    response.assert_status_ok();
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().contains("filename=\"SCAN.pptx\""));
    gw.assert_clean();
}

#[cfg(unix)]
#[tokio::test]
async fn backend_failure_is_500_and_cleans_up() {
    let gw = office_gateway(FakeOffice::Fails);
    let response = gw
        .server
        .post("/convert/libreoffice")
        .multipart(pdf_form("deck.pdf", FAKE_PDF))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    let message = body["error"].as_str().unwrap();
    assert_eq!(
        message,
        "Conversion failed with the libreoffice backend, please check the server logs."
    );
    assert!(!message.contains("could not be loaded"));
    gw.assert_clean();
}

#[cfg(unix)]
#[tokio::test]
async fn silent_office_suite_is_500() {
    let gw = office_gateway(FakeOffice::Silent);
    gw.server
        .post("/convert/libreoffice")
        .multipart(pdf_form("deck.pdf", FAKE_PDF))
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    gw.assert_clean();
}

#[tokio::test]
async fn unconfigured_cloud_backend_is_500() {
    let gw = gateway_with(|b, _| b, Vec::new());
    let response = gw
        .server
        .post("/convert/adobe")
        .multipart(pdf_form("deck.pdf", FAKE_PDF))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(
        body["error"],
        "Conversion failed with the adobe backend, please check the server logs."
    );
    gw.assert_clean();
}
