//! Validated writes into the output tree.
//!
//! Compiled artifacts come from an external collaborator, so every path they
//! name is checked before anything is written:
//!
//! - Paths are normalized with `path_clean`; any path that resolves outside
//!   its base directory is rejected.
//! - Null bytes and absolute paths are rejected outright.
//!
//! Files written through a [`Publisher`] are tracked so that a failure later
//! in the same stage can remove them again.

use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

use crate::{Error, Result};

/// Join `relative` onto `base_dir`, refusing anything that escapes it.
pub fn validate_output_path(base_dir: &Path, relative: &str) -> Result<PathBuf> {
    if relative.contains('\0') {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' contains a null byte",
            relative.escape_default()
        )));
    }

    let candidate = Path::new(relative);
    if candidate.is_absolute() || candidate.components().any(|c| matches!(c, Component::Prefix(_))) {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' must be relative to '{}'",
            relative,
            base_dir.display()
        )));
    }

    let base = base_dir.clean();
    let full_path = base.join(candidate.clean()).clean();

    if full_path == base || !full_path.starts_with(&base) {
        return Err(Error::InvalidOutputPath(format!(
            "'{}' escapes '{}' (resolved to '{}')",
            relative,
            base.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

/// Writes files and remembers them until [`commit`](Publisher::commit).
///
/// Dropping an uncommitted publisher leaves the files in place; call
/// [`rollback`](Publisher::rollback) to remove them.
#[derive(Debug, Default)]
pub struct Publisher {
    written: Vec<PathBuf>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to `path`, creating parent directories.
    pub async fn write(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::fs(format!("Failed to create directory '{}'", parent.display()), e)
            })?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| Error::fs(format!("Failed to write '{}'", path.display()), e))?;
        self.written.push(path.to_path_buf());
        Ok(())
    }

    /// Number of files written so far.
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    /// Keep everything written.
    pub fn commit(self) -> Vec<PathBuf> {
        self.written
    }

    /// Best-effort removal of everything written, newest first.
    pub async fn rollback(self) {
        for path in self.written.iter().rev() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to roll back file");
                }
            }
        }
    }
}
