//! Local conversion through a headless LibreOffice (`soffice`) subprocess.
//!
//! LibreOffice writes its output into `--outdir` under the input's stem with
//! the target extension. Each call gets its own scratch directory so two
//! concurrent conversions never see each other's files; the directory is a
//! [`tempfile::TempDir`] and is removed when the call returns, on every path.
//!
//! The PDF is opened with the `impress_pdf_import` filter so that pages become
//! slides rather than Draw pages, then exported as `pptx`.

use super::Converter;
use crate::config::GatewayConfig;
use crate::error::ConversionFailure;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Import filter selecting "open PDF as a presentation".
pub const INPUT_FILTER: &str = "impress_pdf_import";

/// Target format passed to `--convert-to`.
pub const TARGET_FORMAT: &str = "pptx";

/// Prefix of the per-call scratch directory.
const SCRATCH_PREFIX: &str = "lo_out_";

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Converter backed by a local office-suite executable.
pub struct LibreOfficeConverter {
    config: Arc<GatewayConfig>,
}

impl LibreOfficeConverter {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionFailure> {
        let program = self.config.soffice_executable();
        let timeout = self.config.soffice_timeout;

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|e| ConversionFailure::io("create scratch directory", std::env::temp_dir(), e))?;

        let args = command_args(scratch.path(), input);
        info!("Running soffice: {}", render_command_line(&program, &args));

        let start = Instant::now();
        let outcome = match run_with_timeout(&program, &args, timeout).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                match &failure {
                    ConversionFailure::Timeout { after } => {
                        error!(kind = %failure.kind(), "[LibreOffice] conversion timed out after {:?}", after);
                    }
                    ConversionFailure::ExecutableNotFound { path } => {
                        error!(
                            kind = %failure.kind(),
                            "[LibreOffice] '{}' not found; install LibreOffice or set SOFFICE_PATH",
                            path.display()
                        );
                    }
                    other => error!(kind = %other.kind(), "[LibreOffice] {}", other),
                }
                return Err(failure);
            }
        };
        debug!(
            "soffice exited with {:?} after {}ms",
            outcome.code,
            start.elapsed().as_millis()
        );

        if !outcome.success() {
            error!("[LibreOffice] returncode={:?}", outcome.code);
            error!("[LibreOffice] STDOUT: {}", outcome.stdout.trim());
            error!("[LibreOffice] STDERR: {}", outcome.stderr.trim());
            return Err(ConversionFailure::NonZeroExit {
                code: outcome.code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            });
        }

        let produced = produced_path(scratch.path(), input);
        let produced_len = tokio::fs::metadata(&produced)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if produced_len == 0 {
            error!("[LibreOffice] conversion produced no output or an empty file");
            error!("[LibreOffice] STDOUT: {}", outcome.stdout.trim());
            error!("[LibreOffice] STDERR: {}", outcome.stderr.trim());
            return Err(ConversionFailure::NoOutputProduced { path: produced });
        }

        move_file(&produced, output).await?;
        info!(
            "[LibreOffice] converted {} -> {} ({} bytes)",
            input.display(),
            output.display(),
            produced_len
        );
        Ok(())
    }
}

/// The fixed argument list, in order.
pub fn command_args(outdir: &Path, input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--headless",
        "--nologo",
        "--nofirststartwizard",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(format!("--infilter={INPUT_FILTER}").into());
    args.push("--convert-to".into());
    args.push(TARGET_FORMAT.into());
    args.push("--outdir".into());
    args.push(outdir.as_os_str().to_owned());
    args.push(input.as_os_str().to_owned());
    args
}

/// Where LibreOffice writes the result: `<outdir>/<input stem>.pptx`.
pub fn produced_path(outdir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outdir.join(format!("{stem}.{TARGET_FORMAT}"))
}

/// Spawn `program`, capture its output, and kill it if it outlives `timeout`.
pub async fn run_with_timeout(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<ProcessOutcome, ConversionFailure> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConversionFailure::ExecutableNotFound {
                    path: program.to_path_buf(),
                }
            } else {
                ConversionFailure::io("spawn", program, e)
            }
        })?;

    // Dropping the `wait_with_output` future on timeout drops the child,
    // and `kill_on_drop` terminates it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ProcessOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(e)) => Err(ConversionFailure::io("wait for", program, e)),
        Err(_elapsed) => Err(ConversionFailure::Timeout { after: timeout }),
    }
}

/// Rename `from` onto `to`, copying when the two live on different filesystems.
pub(crate) async fn move_file(from: &Path, to: &Path) -> Result<(), ConversionFailure> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!("rename crosses filesystems, copying {} instead", from.display());
            tokio::fs::copy(from, to)
                .await
                .map_err(|e| ConversionFailure::io("copy converted file to", to, e))?;
            tokio::fs::remove_file(from)
                .await
                .map_err(|e| ConversionFailure::io("remove", from, e))
        }
        Err(e) => Err(ConversionFailure::io("move converted file to", to, e)),
    }
}

fn render_command_line(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| {
            let part = part.to_string_lossy();
            if part.contains(' ') {
                format!("\"{part}\"")
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
