// Staged source files - temporary local copies of uploaded documents

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

// Disambiguates stagings that land in the same millisecond.
static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A temporary on-disk copy of an uploaded source file.
///
/// The file lives under the staging directory with a name derived from the
/// creation timestamp and the original upload name, so concurrent requests
/// never collide. Ownership of the handle is ownership of the file: callers
/// release it explicitly on every terminal path, and `Drop` removes the file
/// as a backstop if a path was missed (panic, task cancellation).
#[derive(Debug)]
pub struct StagedSource {
    path: PathBuf,
    released: bool,
}

impl StagedSource {
    /// Write `bytes` into the staging directory and return the owning handle.
    ///
    /// The directory is created if missing. The original file name is
    /// sanitized so an upload name cannot escape the staging directory.
    pub async fn stage(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create staging dir {}", dir.display()))?;

        let stamp = Utc::now().timestamp_millis();
        let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!(
            "@temp_{}_{}_{}",
            stamp,
            seq,
            sanitize_file_name(file_name)
        ));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to stage upload at {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "staged uploaded file");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Read the staged bytes back.
    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read staged file {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file. Deletion failures are logged, not propagated:
    /// cleanup must never fail the surrounding flow.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "failed to remove staged file");
        } else {
            debug!(path = %self.path.display(), "released staged file");
        }
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Keep only the final path component and replace separators, so a crafted
/// upload name like `../../x.js` stays inside the staging directory.
fn sanitize_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.replace(
        |c: char| c.is_control() || matches!(c, '/' | '\\' | ':'),
        "_",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_writes_and_release_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedSource::stage(dir.path(), "app.js", b"console.log(1)")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(staged.read().await.unwrap(), b"console.log(1)");

        staged.release().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_removes_unreleased_file() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedSource::stage(dir.path(), "app.js", b"x").await.unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn upload_name_cannot_escape_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedSource::stage(dir.path(), "../../evil.js", b"x")
            .await
            .unwrap();
        assert!(staged.path().starts_with(dir.path()));
        staged.release().await;
    }
}
