//! Per-request file paths and their cleanup.
//!
//! Every request gets a fresh UUID v4 (32 lowercase hex characters), which
//! names both its saved upload and its converted output. [`RequestFiles`] owns
//! the two paths and deletes them when it is dropped, so cleanup also runs
//! when a handler returns early or unwinds.

use crate::config::GatewayConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Length of a simple-format UUID.
const ID_LEN: usize = 32;

/// The input/output pair of one request.
#[derive(Debug)]
pub struct RequestFiles {
    id: String,
    input: PathBuf,
    output: PathBuf,
}

impl RequestFiles {
    /// Allocate paths in the configured upload and output directories.
    pub fn new(config: &GatewayConfig) -> Self {
        Self::in_dirs(&config.upload_dir, &config.output_dir)
    }

    pub fn in_dirs(upload_dir: &Path, output_dir: &Path) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            input: upload_dir.join(format!("{id}.pdf")),
            output: output_dir.join(format!("{id}.pptx")),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

// `Drop` cannot await, so these are blocking `std::fs` unlinks on the
// runtime thread; two per request.
impl Drop for RequestFiles {
    fn drop(&mut self) {
        remove_if_present(&self.input);
        remove_if_present(&self.output);
    }
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Create the upload and output directories if they do not exist.
pub async fn ensure_dirs(config: &GatewayConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.output_dir).await?;
    Ok(())
}

/// `true` for names this gateway generates: `<32 hex>.pdf` or `<32 hex>.pptx`.
pub fn is_request_file(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    stem.len() == ID_LEN
        && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        && matches!(ext, "pdf" | "pptx")
}

/// Remove request files left behind by a crashed process.
///
/// Only names matching [`is_request_file`] whose modification time is at
/// least `older_than` in the past are touched. Other gateway processes may
/// share the directories, and their in-flight files are younger than that.
/// Returns the number of files removed.
pub async fn purge_stale_files(dirs: &[&Path], older_than: Duration) -> usize {
    let mut removed = 0;
    let mut seen: Vec<&Path> = Vec::new();
    for &dir in dirs {
        if seen.contains(&dir) {
            continue;
        }
        seen.push(dir);

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                warn!("Cannot scan {} for stale files: {}", dir.display(), e);
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped scanning {}: {}", dir.display(), e);
                    break;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_request_file(name) {
                continue;
            }
            let age = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => SystemTime::now().duration_since(modified).unwrap_or_default(),
                Err(e) => {
                    debug!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if age < older_than {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale {}: {}", entry.path().display(), e),
            }
        }
    }
    if removed > 0 {
        info!(
            "Removed {} stale request file(s) older than {:?}",
            removed, older_than
        );
    }
    removed
}
