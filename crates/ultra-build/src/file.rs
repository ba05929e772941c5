//! In-memory handles to build artifacts.
//!
//! A [`VirtualFile`] is identified by its *logical path* (`./src/app.css`),
//! relative to the project root. The logical path never changes: hashing and
//! compile relocation only update the separately tracked *final path*, which
//! is where the artifact lives (or is served from) inside its current root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Convert a root-relative filesystem path into logical form (`./a/b.css`).
pub fn to_logical(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("./{}", parts.join("/"))
}

/// Normalize a user supplied path (`client.tsx`, `/client.tsx`, `.\client.tsx`)
/// into logical form.
pub fn normalize_logical(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let mut trimmed = forward.as_str();
    loop {
        let next = trimmed.trim_start_matches("./").trim_start_matches('/');
        if next.len() == trimmed.len() {
            break;
        }
        trimmed = next;
    }
    format!("./{}", trimmed)
}

/// Logical path without its leading `./`, suitable for joining onto a root.
pub fn strip_logical(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path)
}

/// Handle to one artifact of the build.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    path: String,
    root: PathBuf,
    final_path: String,
    contents: Option<Arc<[u8]>>,
    fingerprint: Option<String>,
    removed: bool,
}

impl VirtualFile {
    /// Synthesize a file in memory (e.g. a generated manifest).
    ///
    /// Nothing touches the disk until [`VirtualFile::write`] or
    /// [`Builder::copy_source`](crate::Builder::copy_source) is called.
    pub fn new(path: &str, root: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        let path = normalize_logical(path);
        Self {
            final_path: path.clone(),
            path,
            root: root.into(),
            contents: Some(Arc::from(contents.into())),
            fingerprint: None,
            removed: false,
        }
    }

    /// A file backed by storage; contents are read lazily on first [`load`](Self::load).
    pub fn from_disk(path: &str, root: impl Into<PathBuf>) -> Self {
        let path = normalize_logical(path);
        Self {
            final_path: path.clone(),
            path,
            root: root.into(),
            contents: None,
            fingerprint: None,
            removed: false,
        }
    }

    /// Identity-bearing logical path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current location relative to [`root`](Self::root), after hashing or relocation.
    pub fn final_path(&self) -> &str {
        &self.final_path
    }

    /// Directory the file currently lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute_path(&self) -> PathBuf {
        self.root.join(strip_logical(&self.final_path))
    }

    /// Content fingerprint, once the file has been hashed.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Cached contents, if they have been loaded or supplied.
    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.path).extension().and_then(|ext| ext.to_str())
    }

    pub(crate) fn set_final_path(&mut self, final_path: String) {
        self.final_path = final_path;
    }

    pub(crate) fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = Some(fingerprint);
    }

    /// The same logical file placed under another root, keeping its final path.
    pub(crate) fn rebased(&self, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ..self.clone()
        }
    }

    /// Read the contents from storage if not cached yet.
    pub async fn load(&mut self) -> Result<Arc<[u8]>> {
        if let Some(contents) = &self.contents {
            return Ok(Arc::clone(contents));
        }

        let absolute = self.absolute_path();
        let bytes = tokio::fs::read(&absolute)
            .await
            .map_err(|e| Error::fs(format!("Failed to read '{}'", absolute.display()), e))?;
        let contents: Arc<[u8]> = Arc::from(bytes);
        self.contents = Some(Arc::clone(&contents));
        Ok(contents)
    }

    /// Parse the contents as JSON.
    pub async fn read_as_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let contents = self.load().await?;
        serde_json::from_slice(&contents).map_err(|e| Error::ConfigParse {
            path: self.absolute_path(),
            message: e.to_string(),
        })
    }

    /// Replace the contents and write them to [`absolute_path`](Self::absolute_path).
    pub async fn write(&mut self, contents: impl Into<Vec<u8>>) -> Result<()> {
        let contents: Arc<[u8]> = Arc::from(contents.into());
        let absolute = self.absolute_path();

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::fs(
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }
        tokio::fs::write(&absolute, &contents)
            .await
            .map_err(|e| Error::fs(format!("Failed to write '{}'", absolute.display()), e))?;

        self.contents = Some(contents);
        self.removed = false;
        Ok(())
    }

    /// Serialize `value` as JSON and [`write`](Self::write) it.
    ///
    /// Pretty output uses two-space indentation and ends with a newline.
    pub async fn write_json<T: Serialize>(&mut self, value: &T, pretty: bool) -> Result<()> {
        let encoded = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| Error::ConfigParse {
            path: self.absolute_path(),
            message: e.to_string(),
        })?;

        let mut bytes = encoded.into_bytes();
        if pretty {
            bytes.push(b'\n');
        }
        self.write(bytes).await
    }

    /// Delete the backing file and mark the handle removed.
    ///
    /// The handle stays in its collection so later stages can still look it
    /// up by logical path; they skip it instead.
    pub async fn remove(&mut self) -> Result<()> {
        let absolute = self.absolute_path();
        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::fs(
                    format!("Failed to remove '{}'", absolute.display()),
                    e,
                ));
            }
        }
        self.removed = true;
        self.contents = None;
        Ok(())
    }
}

impl PartialEq for VirtualFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for VirtualFile {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_logical() {
        assert_eq!(normalize_logical("client.tsx"), "./client.tsx");
        assert_eq!(normalize_logical("./client.tsx"), "./client.tsx");
        assert_eq!(normalize_logical("/src/app.css"), "./src/app.css");
        assert_eq!(normalize_logical(".\\src\\app.css"), "./src/app.css");
        assert_eq!(normalize_logical("././a.js"), "./a.js");
    }

    #[test]
    fn test_to_logical() {
        assert_eq!(to_logical(Path::new("src/app.css")), "./src/app.css");
        assert_eq!(to_logical(Path::new("deno.json")), "./deno.json");
    }

    #[test]
    fn test_equality_is_by_logical_path() {
        let a = VirtualFile::new("./a.js", "/one", "x");
        let mut b = VirtualFile::new("a.js", "/two", "y");
        b.set_final_path("./a.123.js".to_string());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_lazy_load_and_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("deno.json"), r#"{"importMap":"./x.json"}"#).unwrap();

        let mut file = VirtualFile::from_disk("./deno.json", temp.path());
        assert!(file.contents().is_none());

        let value: serde_json::Value = file.read_as_json().await.unwrap();
        assert_eq!(value["importMap"], "./x.json");
        assert!(file.contents().is_some());
    }

    #[tokio::test]
    async fn test_invalid_json_is_config_parse_error() {
        let temp = TempDir::new().unwrap();
        let mut file = VirtualFile::new("./deno.json", temp.path(), "{ not json");
        let err = file.read_as_json::<serde_json::Value>().await.unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_remove_marks() {
        let temp = TempDir::new().unwrap();
        let mut file = VirtualFile::new("./nested/dir/file.txt", temp.path(), "");
        file.write("hello").await.unwrap();

        let on_disk = temp.path().join("nested/dir/file.txt");
        assert_eq!(std::fs::read_to_string(&on_disk).unwrap(), "hello");

        file.remove().await.unwrap();
        assert!(file.is_removed());
        assert!(!on_disk.exists());
        assert_eq!(file.path(), "./nested/dir/file.txt");

        // Removing twice is fine
        file.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let mut file = VirtualFile::from_disk("./missing.txt", temp.path());
        assert!(matches!(
            file.load().await.unwrap_err(),
            Error::Filesystem { .. }
        ));
    }
}
