//! Conversion through the Adobe PDF Services export operation.
//!
//! Flow: exchange the client credentials for a bearer token, register an
//! asset and `PUT` the PDF to its pre-signed upload URI, submit an
//! `exportpdf` job, poll the job's `location` until it is done, then fetch
//! the resulting asset. Each call is bounded by `request_timeout` and the
//! poll loop as a whole by `job_timeout`.

use super::{ensure_success, http_error, join_url, BackendKind, Converter};
use crate::config::GatewayConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const TARGET_FORMAT: &str = "pptx";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetResponse {
    upload_uri: String,
    #[serde(rename = "assetID")]
    asset_id: String,
}

/// Body of the job status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub asset: Option<ResultAsset>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultAsset {
    pub download_uri: String,
}

/// What one poll of the job status told us.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Done { download_uri: String },
}

impl JobStatus {
    /// Interpret the status body; a `failed` job becomes [`ConversionFailure::JobFailed`].
    pub fn outcome(self) -> Result<PollOutcome, ConversionFailure> {
        match self.status.as_str() {
            "done" => {
                let asset = self.asset.ok_or_else(|| ConversionFailure::MalformedResponse {
                    stage: "job status",
                    detail: "job is done but carries no asset".to_string(),
                })?;
                Ok(PollOutcome::Done {
                    download_uri: asset.download_uri,
                })
            }
            "failed" => Err(ConversionFailure::JobFailed {
                detail: self
                    .error
                    .map(|e| match e.get("message").and_then(Value::as_str) {
                        Some(msg) => msg.to_string(),
                        None => e.to_string(),
                    })
                    .unwrap_or_else(|| "export job failed without an error body".to_string()),
            }),
            _ => Ok(PollOutcome::Pending),
        }
    }
}

/// Converter backed by Adobe PDF Services.
pub struct AdobeConverter {
    config: Arc<GatewayConfig>,
    client: reqwest::Client,
}

struct Session<'a> {
    client_id: &'a str,
    token: String,
}

impl AdobeConverter {
    pub fn new(config: Arc<GatewayConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn credentials(&self) -> Result<(&str, &str), ConversionFailure> {
        let settings = &self.config.adobe;
        match (
            settings.client_id.as_deref().filter(|s| !s.is_empty()),
            settings.client_secret.as_deref().filter(|s| !s.is_empty()),
        ) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ConversionFailure::NotConfigured {
                backend: BackendKind::Adobe,
                hint: "set ADOBE_CLIENT_ID and ADOBE_CLIENT_SECRET".to_string(),
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.adobe.base_url, path)
    }

    async fn authenticate<'a>(
        &self,
        client_id: &'a str,
        client_secret: &str,
    ) -> Result<Session<'a>, ConversionFailure> {
        let response = self
            .client
            .post(self.url("token"))
            .timeout(self.config.request_timeout)
            .form(&[("client_id", client_id), ("client_secret", client_secret)])
            .send()
            .await
            .map_err(http_error("authentication"))?;
        let token: TokenResponse = ensure_success("authentication", response)
            .await?
            .json()
            .await
            .map_err(http_error("authentication"))?;
        Ok(Session {
            client_id,
            token: token.access_token,
        })
    }

    async fn upload(&self, session: &Session<'_>, input: &Path) -> Result<String, ConversionFailure> {
        let response = self
            .client
            .post(self.url("assets"))
            .timeout(self.config.request_timeout)
            .header("x-api-key", session.client_id)
            .bearer_auth(&session.token)
            .json(&json!({ "mediaType": "application/pdf" }))
            .send()
            .await
            .map_err(http_error("asset registration"))?;
        let asset: AssetResponse = ensure_success("asset registration", response)
            .await?
            .json()
            .await
            .map_err(http_error("asset registration"))?;

        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| ConversionFailure::io("read", input, e))?;
        let response = self
            .client
            .put(&asset.upload_uri)
            .timeout(self.config.request_timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await
            .map_err(http_error("upload"))?;
        ensure_success("upload", response).await?;
        Ok(asset.asset_id)
    }

    async fn submit(&self, session: &Session<'_>, asset_id: &str) -> Result<String, ConversionFailure> {
        let response = self
            .client
            .post(self.url("operation/exportpdf"))
            .timeout(self.config.request_timeout)
            .header("x-api-key", session.client_id)
            .bearer_auth(&session.token)
            .json(&json!({
                "assetID": asset_id,
                "targetFormat": TARGET_FORMAT,
                "ocrLang": self.config.adobe.ocr_locale,
            }))
            .send()
            .await
            .map_err(http_error("job submission"))?;
        let response = ensure_success("job submission", response).await?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ConversionFailure::MalformedResponse {
                stage: "job submission",
                detail: "response has no location header".to_string(),
            })
    }

    async fn poll(&self, session: &Session<'_>, location: &str) -> Result<String, ConversionFailure> {
        let mut interval = tokio::time::interval(self.config.adobe.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let response = self
                .client
                .get(location)
                .timeout(self.config.request_timeout)
                .header("x-api-key", session.client_id)
                .bearer_auth(&session.token)
                .send()
                .await
                .map_err(http_error("job status"))?;
            let status: JobStatus = ensure_success("job status", response)
                .await?
                .json()
                .await
                .map_err(http_error("job status"))?;
            debug!("Adobe export job status: {}", status.status);
            if let PollOutcome::Done { download_uri } = status.outcome()? {
                return Ok(download_uri);
            }
        }
    }

    async fn download(&self, uri: &str, output: &Path) -> Result<usize, ConversionFailure> {
        let response = self
            .client
            .get(uri)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(http_error("download"))?;
        let bytes = ensure_success("download", response)
            .await?
            .bytes()
            .await
            .map_err(http_error("download"))?;
        tokio::fs::write(output, &bytes)
            .await
            .map_err(|e| ConversionFailure::io("write", output, e))?;
        Ok(bytes.len())
    }
}

#[async_trait]
impl Converter for AdobeConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure> {
        let (client_id, client_secret) = self.credentials()?;
        let session = self.authenticate(client_id, client_secret).await?;

        let asset_id = self.upload(&session, input).await?;
        debug!("Adobe asset {} uploaded from {}", asset_id, input.display());

        let location = self.submit(&session, &asset_id).await?;
        info!("Adobe export job submitted: {}", location);

        let ceiling = self.config.job_timeout;
        let download_uri = tokio::time::timeout(ceiling, self.poll(&session, &location))
            .await
            .map_err(|_| ConversionFailure::JobTimeout { after: ceiling })??;

        let written = self.download(&download_uri, output).await?;
        info!(
            "Adobe converted {} -> {} ({} bytes)",
            input.display(),
            output.display(),
            written
        );
        Ok(())
    }
}
