//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Smallest byte string the gateway accepts as an upload.
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj <<>> endobj\ntrailer <<>>\n%%EOF\n";

/// Prefix written by the fake office suite.
pub const FAKE_PPTX: &[u8] = b"PK\x03\x04fake-presentation";

/// Stand-ins for `soffice`, written as shell scripts.
#[derive(Debug, Clone, Copy)]
pub enum FakeOffice {
    /// Writes `<outdir>/<input stem>.pptx` and exits 0.
    Converts,
    /// Prints to both streams and exits 1.
    Fails,
    /// Never finishes on its own.
    Hangs,
    /// Exits 0 without writing anything.
    Silent,
}

impl FakeOffice {
    fn script(self) -> String {
        match self {
            FakeOffice::Converts => r#"#!/bin/sh
outdir=""
prev=""
input=""
for arg in "$@"; do
  if [ "$prev" = "--outdir" ]; then outdir="$arg"; fi
  prev="$arg"
  input="$arg"
done
name=$(basename "$input" .pdf)
printf 'PK\003\004fake-presentation' > "$outdir/$name.pptx"
"#
            .to_string(),
            FakeOffice::Fails => "#!/bin/sh\necho 'loading document'\necho 'Error: source file could not be loaded' >&2\nexit 1\n".to_string(),
            FakeOffice::Hangs => "#!/bin/sh\nexec sleep 30\n".to_string(),
            FakeOffice::Silent => "#!/bin/sh\nexit 0\n".to_string(),
        }
    }
}

/// Write an executable fake `soffice` into `dir` and return its path.
#[cfg(unix)]
pub fn install_fake_office(dir: &Path, kind: FakeOffice) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("soffice-{kind:?}").to_lowercase());
    std::fs::write(&path, kind.script()).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Number of entries in `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
