//! File system utils.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};

pub struct FsHandler;

impl FsHandler {
    /// Replace the content of `path` with `contents`.
    ///
    /// The bytes are written to a temporary sibling file which is then renamed over the
    /// target, so readers only ever observe the previous or the new document.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let file_name = path
            .file_name()
            .context("File path must have a file name")?
            .to_string_lossy();
        let tmp_path = parent.join(format!(".{}.tmp", file_name));

        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(contents)
                .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
            file.sync_all()
                .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
        }

        std::fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} over {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        tracing::trace!(path = %path.display(), bytes = contents.len(), "File replaced");

        Ok(())
    }

    /// Serialize `value` as pretty JSON and atomically write it to `path`.
    pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
        let mut content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {}", path.display()))?;
        content.push('\n');
        Self::write_atomic(path, content.as_bytes())
    }

    pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))
    }

    /// Same as [`FsHandler::read_json`], but a missing file yields `T::default()`.
    pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
        if !path.exists() {
            tracing::debug!(
                path = %path.display(),
                "File not found, starting from an empty document"
            );
            return Ok(T::default());
        }
        Self::read_json(path)
    }

    /// Take an exclusive advisory lock on `path`, creating the file if needed.
    ///
    /// Fails immediately if another process already holds the lock.
    pub fn lock_exclusive(path: &Path) -> anyhow::Result<RunLock> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create lock file {}", path.display()))?;

        FileExt::try_lock_exclusive(&file).with_context(|| {
            format!(
                "Another deployment run holds the lock on {}",
                path.display()
            )
        })?;

        tracing::debug!(path = %path.display(), "Acquired run lock");

        Ok(RunLock {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// Advisory lock held for the duration of a deployment run. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(err = ?err, path = %self.path.display(), "Failed to release run lock");
        }
    }
}
