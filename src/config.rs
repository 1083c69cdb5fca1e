//! Gateway configuration.
//!
//! Everything the gateway reads from its environment lives in
//! [`GatewayConfig`], built once at start-up through [`GatewayConfigBuilder`]
//! and shared read-only (behind an `Arc`) by every request handler and backend.
//! Nothing in the crate mutates configuration after [`GatewayConfigBuilder::build`].

use crate::backend::BackendKind;
use crate::error::GatewayError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Production CloudConvert REST endpoint.
pub const CLOUDCONVERT_API_URL: &str = "https://api.cloudconvert.com";
/// Production CloudConvert synchronous (blocking wait) endpoint.
pub const CLOUDCONVERT_SYNC_URL: &str = "https://sync.api.cloudconvert.com";
/// Sandbox CloudConvert REST endpoint.
pub const CLOUDCONVERT_SANDBOX_API_URL: &str = "https://api.sandbox.cloudconvert.com";
/// Sandbox CloudConvert synchronous endpoint.
pub const CLOUDCONVERT_SANDBOX_SYNC_URL: &str = "https://sync.api.sandbox.cloudconvert.com";

/// Configuration for the conversion gateway.
///
/// # Example
/// ```rust
/// use pdf2pptx_gateway::{BackendKind, GatewayConfig};
/// use std::time::Duration;
///
/// let config = GatewayConfig::builder()
///     .upload_dir("/var/tmp/pdf2pptx/uploads")
///     .output_dir("/var/tmp/pdf2pptx/outputs")
///     .default_backend(BackendKind::LibreOffice)
///     .soffice_timeout(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(config.default_backend, BackendKind::LibreOffice);
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP server binds to. Default: `0.0.0.0:5000`.
    pub bind: SocketAddr,

    /// Directory receiving uploaded PDFs (`<id>.pdf`). Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory receiving converted presentations (`<id>.pptx`). Default: `outputs`.
    pub output_dir: PathBuf,

    /// Backend used by `POST /convert` without a selector. Default: LibreOffice.
    pub default_backend: BackendKind,

    /// Largest accepted request body in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Adobe PDF Services credentials and endpoint.
    pub adobe: AdobeSettings,

    /// CloudConvert credentials and endpoints.
    pub cloudconvert: CloudConvertSettings,

    /// ConvertAPI credentials and endpoint.
    pub convertapi: ConvertApiSettings,

    /// Office-suite executable. `None` means `soffice` resolved through `PATH`.
    pub soffice_path: Option<PathBuf>,

    /// Wall-clock budget for one office-suite run. Default: 300 s.
    pub soffice_timeout: Duration,

    /// Local ceiling on waiting for a remote job to finish. Default: 600 s.
    ///
    /// Bounds both the CloudConvert blocking wait and the Adobe polling loop.
    pub job_timeout: Duration,

    /// Ceiling on downloading a finished result file. Default: 600 s.
    pub download_timeout: Duration,

    /// Ceiling on each single call to a cloud service outside the job wait
    /// and the result download: authentication, job creation, source upload,
    /// submission and status polls. Default: 300 s.
    pub request_timeout: Duration,
}

/// Adobe PDF Services settings.
#[derive(Clone)]
pub struct AdobeSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// REST base URL. Default: `https://pdf-services.adobe.io`.
    pub base_url: String,
    /// OCR locale passed with the export job. Default: `en-US`.
    pub ocr_locale: String,
    /// Delay between job-status polls. Default: 2 s.
    pub poll_interval: Duration,
}

impl Default for AdobeSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: "https://pdf-services.adobe.io".to_string(),
            ocr_locale: "en-US".to_string(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// CloudConvert settings.
#[derive(Clone)]
pub struct CloudConvertSettings {
    pub api_key: Option<String>,
    /// REST base URL used to create jobs.
    pub api_url: String,
    /// Synchronous base URL used to block until a job is terminal.
    pub sync_url: String,
}

impl CloudConvertSettings {
    /// Settings pointing at the production or sandbox environment.
    pub fn for_environment(sandbox: bool) -> Self {
        let (api_url, sync_url) = if sandbox {
            (CLOUDCONVERT_SANDBOX_API_URL, CLOUDCONVERT_SANDBOX_SYNC_URL)
        } else {
            (CLOUDCONVERT_API_URL, CLOUDCONVERT_SYNC_URL)
        };
        Self {
            api_key: None,
            api_url: api_url.to_string(),
            sync_url: sync_url.to_string(),
        }
    }
}

impl Default for CloudConvertSettings {
    fn default() -> Self {
        Self::for_environment(false)
    }
}

/// ConvertAPI settings.
#[derive(Clone)]
pub struct ConvertApiSettings {
    pub secret: Option<String>,
    /// REST base URL. Default: `https://v2.convertapi.com`.
    pub base_url: String,
}

impl Default for ConvertApiSettings {
    fn default() -> Self {
        Self {
            secret: None,
            base_url: "https://v2.convertapi.com".to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            default_backend: BackendKind::LibreOffice,
            max_upload_bytes: 100 * 1024 * 1024,
            adobe: AdobeSettings::default(),
            cloudconvert: CloudConvertSettings::default(),
            convertapi: ConvertApiSettings::default(),
            soffice_path: None,
            soffice_timeout: Duration::from_secs(300),
            job_timeout: Duration::from_secs(600),
            download_timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(300),
        }
    }
}

fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("default_backend", &self.default_backend)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("adobe", &self.adobe)
            .field("cloudconvert", &self.cloudconvert)
            .field("convertapi", &self.convertapi)
            .field("soffice_path", &self.soffice_path)
            .field("soffice_timeout", &self.soffice_timeout)
            .field("job_timeout", &self.job_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl fmt::Debug for AdobeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdobeSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("base_url", &self.base_url)
            .field("ocr_locale", &self.ocr_locale)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl fmt::Debug for CloudConvertSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConvertSettings")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("sync_url", &self.sync_url)
            .finish()
    }
}

impl fmt::Debug for ConvertApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertApiSettings")
            .field("secret", &redact(&self.secret))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GatewayConfig {
    /// Create a new builder for `GatewayConfig`.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `kind` has the credentials it needs.
    ///
    /// The local backend is always considered configured; a missing
    /// executable only shows up when a conversion is attempted.
    pub fn is_configured(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Adobe => {
                non_empty(&self.adobe.client_id) && non_empty(&self.adobe.client_secret)
            }
            BackendKind::CloudConvert => non_empty(&self.cloudconvert.api_key),
            BackendKind::ConvertApi => non_empty(&self.convertapi.secret),
            BackendKind::LibreOffice => true,
        }
    }

    /// Age past which a request file cannot belong to a live request.
    ///
    /// Sums every ceiling a single request can run into, counting the four
    /// setup calls of the longest cloud flow (token, asset, upload, submit).
    pub fn stale_file_age(&self) -> Duration {
        self.soffice_timeout
            .saturating_add(self.job_timeout)
            .saturating_add(self.download_timeout)
            .saturating_add(self.request_timeout.saturating_mul(4))
    }

    /// The office-suite executable to spawn.
    pub fn soffice_executable(&self) -> PathBuf {
        self.soffice_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("soffice"))
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.bind = addr;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn default_backend(mut self, kind: BackendKind) -> Self {
        self.config.default_backend = kind;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn adobe_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.adobe.client_id = Some(client_id.into());
        self.config.adobe.client_secret = Some(client_secret.into());
        self
    }

    pub fn adobe_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.adobe.base_url = url.into();
        self
    }

    pub fn adobe_ocr_locale(mut self, locale: impl Into<String>) -> Self {
        self.config.adobe.ocr_locale = locale.into();
        self
    }

    pub fn adobe_poll_interval(mut self, interval: Duration) -> Self {
        self.config.adobe.poll_interval = interval;
        self
    }

    pub fn cloudconvert_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.cloudconvert.api_key = Some(key.into());
        self
    }

    /// Switch both CloudConvert endpoints to the sandbox (or back to production).
    pub fn cloudconvert_sandbox(mut self, sandbox: bool) -> Self {
        let api_key = self.config.cloudconvert.api_key.take();
        self.config.cloudconvert = CloudConvertSettings {
            api_key,
            ..CloudConvertSettings::for_environment(sandbox)
        };
        self
    }

    /// Override both CloudConvert endpoints (e.g. to point at a local mock).
    pub fn cloudconvert_urls(mut self, api_url: impl Into<String>, sync_url: impl Into<String>) -> Self {
        self.config.cloudconvert.api_url = api_url.into();
        self.config.cloudconvert.sync_url = sync_url.into();
        self
    }

    pub fn convertapi_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.convertapi.secret = Some(secret.into());
        self
    }

    pub fn convertapi_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.convertapi.base_url = url.into();
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = Some(path.into());
        self
    }

    pub fn soffice_timeout(mut self, timeout: Duration) -> Self {
        self.config.soffice_timeout = timeout;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = timeout;
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GatewayConfig, GatewayError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(GatewayError::InvalidConfig(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }
        for (name, value) in [
            ("soffice_timeout", c.soffice_timeout),
            ("job_timeout", c.job_timeout),
            ("download_timeout", c.download_timeout),
            ("request_timeout", c.request_timeout),
            ("adobe poll_interval", c.adobe.poll_interval),
        ] {
            if value.is_zero() {
                return Err(GatewayError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(self.config)
    }
}
