//! Conversion backends.
//!
//! Every backend implements [`Converter`]: given the path of a saved PDF and
//! the path the presentation must end up at, it either produces that file or
//! returns a [`ConversionFailure`]. Backends never see HTTP types and never
//! delete the input file; both concerns belong to the request pipeline.
//!
//! | Backend | Pattern |
//! |---------|---------|
//! | [`adobe`]        | upload asset → submit export job → poll → download |
//! | [`cloudconvert`] | create import/convert/export job → upload → wait → fetch URL |
//! | [`convertapi`]   | one synchronous convert call → save → rename |
//! | [`libreoffice`]  | headless `soffice` subprocess in a scratch directory |
//!
//! Selection is explicit: [`Backends::get`] matches on [`BackendKind`].

pub mod adobe;
pub mod cloudconvert;
pub mod convertapi;
pub mod libreoffice;

use crate::config::GatewayConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Ceiling on establishing a TCP/TLS connection to a cloud service.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies one of the four interchangeable backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Adobe PDF Services export API.
    Adobe,
    /// CloudConvert job/task graph.
    CloudConvert,
    /// ConvertAPI synchronous conversion.
    ConvertApi,
    /// Local LibreOffice in headless mode.
    LibreOffice,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Adobe,
        BackendKind::CloudConvert,
        BackendKind::ConvertApi,
        BackendKind::LibreOffice,
    ];

    /// The route selector, e.g. `cloudconvert` in `POST /convert/cloudconvert`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Adobe => "adobe",
            BackendKind::CloudConvert => "cloudconvert",
            BackendKind::ConvertApi => "convertapi",
            BackendKind::LibreOffice => "libreoffice",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a selector names no backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown backend '{}' (expected one of: adobe, cloudconvert, convertapi, libreoffice)",
            self.0
        )
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for BackendKind {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBackend(s.to_string()))
    }
}

/// Converts a PDF on disk into a PPTX on disk.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Produce `output` from `input`.
    ///
    /// On success `output` exists and is non-empty. On failure the backend
    /// may leave a partial `output` behind; the caller removes it.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure>;
}

/// One converter per [`BackendKind`], built once at start-up.
#[derive(Clone)]
pub struct Backends {
    adobe: Arc<dyn Converter>,
    cloudconvert: Arc<dyn Converter>,
    convertapi: Arc<dyn Converter>,
    libreoffice: Arc<dyn Converter>,
}

impl Backends {
    /// Build the four real backends from `config`, sharing one HTTP client.
    pub fn from_config(config: &Arc<GatewayConfig>) -> Result<Self, ConversionFailure> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pdf2pptx-gateway/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .build()
            .map_err(|source| ConversionFailure::Http {
                stage: "client construction",
                source,
            })?;

        Ok(Self {
            adobe: Arc::new(adobe::AdobeConverter::new(Arc::clone(config), client.clone())),
            cloudconvert: Arc::new(cloudconvert::CloudConvertConverter::new(
                Arc::clone(config),
                client.clone(),
            )),
            convertapi: Arc::new(convertapi::ConvertApiConverter::new(
                Arc::clone(config),
                client,
            )),
            libreoffice: Arc::new(libreoffice::LibreOfficeConverter::new(Arc::clone(config))),
        })
    }

    /// Replace the converter registered for `kind`.
    pub fn with_converter(mut self, kind: BackendKind, converter: Arc<dyn Converter>) -> Self {
        match kind {
            BackendKind::Adobe => self.adobe = converter,
            BackendKind::CloudConvert => self.cloudconvert = converter,
            BackendKind::ConvertApi => self.convertapi = converter,
            BackendKind::LibreOffice => self.libreoffice = converter,
        }
        self
    }

    pub fn get(&self, kind: BackendKind) -> &dyn Converter {
        match kind {
            BackendKind::Adobe => self.adobe.as_ref(),
            BackendKind::CloudConvert => self.cloudconvert.as_ref(),
            BackendKind::ConvertApi => self.convertapi.as_ref(),
            BackendKind::LibreOffice => self.libreoffice.as_ref(),
        }
    }
}

// ── Shared HTTP helpers for the cloud backends ───────────────────────────

/// Turn a non-success response into a [`ConversionFailure`].
///
/// HTTP 429 becomes [`ConversionFailure::UsageLimit`]; every other status
/// becomes [`ConversionFailure::ServiceApi`] carrying the response body.
pub(crate) async fn ensure_success(
    stage: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ConversionFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = summarise_body(&body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(ConversionFailure::UsageLimit { stage, message })
    } else {
        Err(ConversionFailure::ServiceApi {
            stage,
            status: status.as_u16(),
            message,
        })
    }
}

/// Keep error bodies short enough for a single log line.
fn summarise_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}\u{2026}", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

pub(crate) fn http_error(stage: &'static str) -> impl FnOnce(reqwest::Error) -> ConversionFailure {
    move |source| ConversionFailure::Http { stage, source }
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_kind_case_insensitive() {
        assert_eq!("adobe".parse::<BackendKind>(), Ok(BackendKind::Adobe));
        assert_eq!(
            "CloudConvert".parse::<BackendKind>(),
            Ok(BackendKind::CloudConvert)
        );
        assert_eq!(
            " LIBREOFFICE ".parse::<BackendKind>(),
            Ok(BackendKind::LibreOffice)
        );
        assert_eq!(
            "gimp".parse::<BackendKind>(),
            Err(UnknownBackend("gimp".into()))
        );
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>(), Ok(kind));
        }
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://a.io/", "/v2/jobs"), "https://a.io/v2/jobs");
        assert_eq!(join_url("https://a.io", "v2/jobs"), "https://a.io/v2/jobs");
    }

    #[test]
    fn summarise_body_truncates() {
        assert_eq!(summarise_body("  "), "<empty body>");
        let long = "x".repeat(1000);
        let s = summarise_body(&long);
        assert!(s.chars().count() <= 301);
        assert!(s.ends_with('\u{2026}'));
    }
}
