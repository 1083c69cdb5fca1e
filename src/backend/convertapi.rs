//! Conversion through ConvertAPI's synchronous `pdf → pptx` endpoint.
//!
//! One call does the whole conversion. The service answers with a list of
//! result files, each carrying either a download `Url` (when `StoreFile` is
//! set) or inline base64 `FileData`. Results are saved under their
//! service-chosen names into a scratch directory beside the requested output,
//! and the first one is renamed onto the output path.
//!
//! The conversion call does the remote work inline, so it is bounded by
//! `job_timeout` rather than the shorter per-call ceiling.

use super::libreoffice::move_file;
use super::{ensure_success, http_error, join_url, BackendKind, Converter};
use crate::config::GatewayConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONVERT_PATH: &str = "convert/pdf/to/pptx";
const SCRATCH_PREFIX: &str = ".convertapi_";
const FALLBACK_NAME: &str = "result.pptx";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConvertResponse {
    #[serde(default)]
    pub files: Vec<ResultFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultFile {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_data: Option<String>,
}

/// Reduce a service-chosen file name to a single safe path component.
pub fn local_name(file_name: Option<&str>) -> String {
    let name = file_name
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Converter backed by ConvertAPI.
pub struct ConvertApiConverter {
    config: Arc<GatewayConfig>,
    client: reqwest::Client,
}

impl ConvertApiConverter {
    pub fn new(config: Arc<GatewayConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn secret(&self) -> Result<&str, ConversionFailure> {
        self.config
            .convertapi
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConversionFailure::NotConfigured {
                backend: BackendKind::ConvertApi,
                hint: "set CONVERTAPI_SECRET".to_string(),
            })
    }

    async fn request(&self, secret: &str, input: &Path) -> Result<ConvertResponse, ConversionFailure> {
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| ConversionFailure::io("read", input, e))?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(http_error("conversion"))?;
        let form = reqwest::multipart::Form::new()
            .part("File", part)
            .text("StoreFile", "true");

        let response = self
            .client
            .post(join_url(&self.config.convertapi.base_url, CONVERT_PATH))
            .bearer_auth(secret)
            .multipart(form)
            .send()
            .await
            .map_err(http_error("conversion"))?;
        ensure_success("conversion", response)
            .await?
            .json()
            .await
            .map_err(http_error("conversion"))
    }

    /// Write one result file into `dir`, returning its path.
    async fn save(&self, file: &ResultFile, dir: &Path) -> Result<PathBuf, ConversionFailure> {
        let bytes = if let Some(url) = &file.url {
            let response = self
                .client
                .get(url)
                .timeout(self.config.download_timeout)
                .send()
                .await
                .map_err(http_error("download"))?;
            ensure_success("download", response)
                .await?
                .bytes()
                .await
                .map_err(http_error("download"))?
                .to_vec()
        } else if let Some(data) = &file.file_data {
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| ConversionFailure::MalformedResponse {
                    stage: "conversion",
                    detail: format!("FileData is not valid base64: {e}"),
                })?
        } else {
            return Err(ConversionFailure::MalformedResponse {
                stage: "conversion",
                detail: "result file has neither Url nor FileData".to_string(),
            });
        };

        let path = dir.join(local_name(file.file_name.as_deref()));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ConversionFailure::io("write", &path, e))?;
        debug!("Saved ConvertAPI result {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

#[async_trait]
impl Converter for ConvertApiConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure> {
        let secret = self.secret()?;

        let ceiling = self.config.job_timeout;
        let result = tokio::time::timeout(ceiling, self.request(secret, input))
            .await
            .map_err(|_| ConversionFailure::JobTimeout { after: ceiling })??;
        if result.files.is_empty() {
            return Err(ConversionFailure::NoOutputFiles);
        }

        // Scratch lives beside the output so the final rename stays on one filesystem.
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| ConversionFailure::io("create scratch directory in", &parent, e))?;

        let mut saved = Vec::with_capacity(result.files.len());
        for file in &result.files {
            saved.push(self.save(file, scratch.path()).await?);
        }
        let first = saved.first().ok_or(ConversionFailure::NoOutputFiles)?;
        move_file(first, output).await?;

        info!(
            "ConvertAPI converted {} -> {} ({} file(s) returned)",
            input.display(),
            output.display(),
            saved.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_keeps_final_component() {
        assert_eq!(local_name(Some("deck.pptx")), "deck.pptx");
        assert_eq!(local_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(local_name(Some("C:\\temp\\deck.pptx")), "deck.pptx");
    }

    #[test]
    fn local_name_falls_back() {
        assert_eq!(local_name(None), FALLBACK_NAME);
        assert_eq!(local_name(Some("")), FALLBACK_NAME);
        assert_eq!(local_name(Some("dir/..")), FALLBACK_NAME);
    }

    #[test]
    fn response_parses_pascal_case() {
        let response: ConvertResponse = serde_json::from_value(serde_json::json!({
            "ConversionCost": 1,
            "Files": [
                { "FileName": "a.pptx", "FileExt": "pptx", "Url": "https://v2.convertapi.com/d/a" },
                { "FileName": "b.pptx", "FileData": "UEsDBA==" }
            ]
        }))
        .unwrap();
        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[0].url.as_deref(), Some("https://v2.convertapi.com/d/a"));
        assert_eq!(response.files[1].file_data.as_deref(), Some("UEsDBA=="));
    }
}
