//! Conversion through the CloudConvert v2 job API.
//!
//! A conversion is one remote job made of three named tasks:
//!
//! ```text
//! import-file (import/upload) ──▶ convert-file (pdf → pptx) ──▶ export-file (export/url)
//! ```
//!
//! The gateway creates the job, posts the PDF to the upload form attached to
//! the import task, blocks on the synchronous API until the job is terminal,
//! then downloads the first file listed by the finished export task. Task
//! status transitions are driven entirely by the service; this module only
//! reads the terminal state.

use super::{ensure_success, http_error, join_url, Converter};
use crate::config::GatewayConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

pub const IMPORT_TASK: &str = "import-file";
pub const CONVERT_TASK: &str = "convert-file";
pub const EXPORT_TASK: &str = "export-file";

const EXPORT_OPERATION: &str = "export/url";

/// Buffer size used when streaming the result file to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// Status of a job or of one of its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Waiting,
    Processing,
    Finished,
    Error,
    /// Any status this client does not know about; treated as non-terminal.
    #[serde(other)]
    Unknown,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Error)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// A remote job as returned by `POST /v2/jobs` and the synchronous wait.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskResult {
    /// Present on `import/upload` tasks: where and how to post the file.
    #[serde(default)]
    pub form: Option<UploadForm>,
    /// Present on finished `export/url` tasks.
    #[serde(default)]
    pub files: Vec<ExportedFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadForm {
    pub url: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Job {
    pub fn task_named(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name.as_deref() == Some(name))
    }

    /// The first `export/url` task whose status is `finished`.
    pub fn finished_export(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.operation == EXPORT_OPERATION && t.status == Status::Finished)
    }

    fn failure_summary(&self) -> String {
        let messages: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.status == Status::Error)
            .map(|t| {
                format!(
                    "{}: {}",
                    t.name.as_deref().unwrap_or(&t.operation),
                    t.message.as_deref().unwrap_or("no message")
                )
            })
            .collect();
        if messages.is_empty() {
            format!("job {} ended with status {:?}", self.id, self.status)
        } else {
            messages.join("; ")
        }
    }
}

/// The import → convert → export task graph for one PDF.
pub fn job_payload() -> Value {
    json!({
        "tasks": {
            IMPORT_TASK: { "operation": "import/upload" },
            CONVERT_TASK: {
                "operation": "convert",
                "input": IMPORT_TASK,
                "input_format": "pdf",
                "output_format": "pptx"
            },
            EXPORT_TASK: { "operation": EXPORT_OPERATION, "input": CONVERT_TASK }
        }
    })
}

/// Locate the download URL of a terminal job.
pub fn export_url(job: &Job) -> Result<&str, ConversionFailure> {
    let Some(export) = job.finished_export() else {
        return Err(ConversionFailure::JobFailed {
            detail: job.failure_summary(),
        });
    };

    let files = export.result.as_ref().map(|r| r.files.as_slice()).unwrap_or(&[]);
    let first = files.first().ok_or(ConversionFailure::NoExportFiles)?;
    first
        .url
        .as_deref()
        .ok_or_else(|| ConversionFailure::MalformedResponse {
            stage: "job wait",
            detail: "export file entry has no url".to_string(),
        })
}

/// Converter backed by CloudConvert.
pub struct CloudConvertConverter {
    config: Arc<GatewayConfig>,
    client: reqwest::Client,
}

impl CloudConvertConverter {
    pub fn new(config: Arc<GatewayConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api_key(&self) -> Result<&str, ConversionFailure> {
        self.config
            .cloudconvert
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConversionFailure::NotConfigured {
                backend: super::BackendKind::CloudConvert,
                hint: "set CLOUDCONVERT_API_KEY".to_string(),
            })
    }

    async fn create_job(&self, api_key: &str) -> Result<Job, ConversionFailure> {
        let url = join_url(&self.config.cloudconvert.api_url, "v2/jobs");
        let response = self
            .client
            .post(&url)
            .timeout(self.config.request_timeout)
            .bearer_auth(api_key)
            .json(&job_payload())
            .send()
            .await
            .map_err(http_error("job creation"))?;
        let envelope: Envelope<Job> = ensure_success("job creation", response)
            .await?
            .json()
            .await
            .map_err(http_error("job creation"))?;
        Ok(envelope.data)
    }

    async fn upload(&self, form: &UploadForm, input: &Path) -> Result<(), ConversionFailure> {
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| ConversionFailure::io("read", input, e))?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());

        let mut multipart = reqwest::multipart::Form::new();
        for (key, value) in &form.parameters {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            multipart = multipart.text(key.clone(), value);
        }
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(http_error("upload"))?;
        multipart = multipart.part("file", part);

        let response = self
            .client
            .post(&form.url)
            .timeout(self.config.request_timeout)
            .multipart(multipart)
            .send()
            .await
            .map_err(http_error("upload"))?;
        ensure_success("upload", response).await?;
        Ok(())
    }

    /// Block on the synchronous endpoint until the job is terminal.
    async fn wait(&self, api_key: &str, job_id: &str) -> Result<Job, ConversionFailure> {
        let url = join_url(&self.config.cloudconvert.sync_url, &format!("v2/jobs/{job_id}"));
        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(http_error("job wait"))?;
        let envelope: Envelope<Job> = ensure_success("job wait", response)
            .await?
            .json()
            .await
            .map_err(http_error("job wait"))?;
        Ok(envelope.data)
    }

    async fn download(&self, url: &str, output: &Path) -> Result<u64, ConversionFailure> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(http_error("download"))?;
        let response = ensure_success("download", response).await?;

        let file = tokio::fs::File::create(output)
            .await
            .map_err(|e| ConversionFailure::io("create", output, e))?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_error("download"))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| ConversionFailure::io("write", output, e))?;
            written += chunk.len() as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| ConversionFailure::io("flush", output, e))?;
        Ok(written)
    }
}

#[async_trait]
impl Converter for CloudConvertConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure> {
        let api_key = self.api_key()?;

        let job = self.create_job(api_key).await?;
        info!(job_id = %job.id, "CloudConvert job created");

        let form = job
            .task_named(IMPORT_TASK)
            .and_then(|t| t.result.as_ref())
            .and_then(|r| r.form.as_ref())
            .ok_or_else(|| ConversionFailure::MalformedResponse {
                stage: "job creation",
                detail: format!("task '{IMPORT_TASK}' has no upload form"),
            })?;
        self.upload(form, input).await?;
        debug!(job_id = %job.id, "Uploaded {}", input.display());

        let ceiling = self.config.job_timeout;
        let job = tokio::time::timeout(ceiling, self.wait(api_key, &job.id))
            .await
            .map_err(|_| ConversionFailure::JobTimeout { after: ceiling })??;
        debug!(job_id = %job.id, status = ?job.status, "CloudConvert job is terminal");

        let url = export_url(&job)?;
        let written = self.download(url, output).await?;
        info!(
            job_id = %job.id,
            "CloudConvert converted {} -> {} ({} bytes)",
            input.display(),
            output.display(),
            written
        );
        Ok(())
    }
}
