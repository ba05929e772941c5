//! Asset manifest: logical path → served path.
//!
//! Serialized as a JSON array of `[original, final]` pairs:
//!
//! ```json
//! [
//!   [
//!     "./src/app.css",
//!     "/src/app.3f2a9c0d1b7e4a55.css"
//!   ]
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::file::{VirtualFile, strip_logical};
use crate::glob::PatternSet;
use crate::source::Sources;
use crate::{Error, Result};

/// Ordered `(original, final)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    /// One entry per active file not matched by `exclude`, in collection order.
    pub fn from_sources(sources: &Sources, exclude: &PatternSet, prefix: &str) -> Self {
        let entries = sources
            .active()
            .filter(|file| !exclude.is_match(file.path()))
            .map(|file| (file.path().to_string(), with_prefix(prefix, file.final_path())))
            .collect();
        Self { entries }
    }

    /// Replace a leading `from` with `to` on the original-path side.
    pub fn rewrite(&mut self, from: &str, to: &str) {
        for (original, _) in &mut self.entries {
            if let Some(rest) = original.strip_prefix(from) {
                *original = format!("{}{}", to, rest);
            }
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Served path for an original path.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(o, _)| o == original)
            .map(|(_, f)| f.as_str())
    }

    /// Pretty JSON with two-space indentation.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::ConfigParse {
            path: "asset manifest".into(),
            message: e.to_string(),
        })
    }

    /// A synthesized file holding this manifest, not yet written.
    pub fn to_file(&self, path: &str, output: &Path) -> Result<VirtualFile> {
        Ok(VirtualFile::new(path, output, self.to_json()?))
    }
}

fn with_prefix(prefix: &str, final_path: &str) -> String {
    let relative = strip_logical(final_path);
    if prefix.is_empty() {
        relative.to_string()
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, relative)
    } else {
        format!("{}/{}", prefix, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sources(root: &Path) -> Sources {
        let mut hashed = VirtualFile::new("./src/app.css", root, "body{}");
        hashed.set_final_path("./src/app.abc123.css".to_string());
        [
            VirtualFile::new("./deno.json", root, "{}"),
            VirtualFile::new("./importMap.server.json", root, "{}"),
            hashed,
            VirtualFile::new("./public/favicon.ico", root, ""),
            VirtualFile::new("./server.tsx", root, ""),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_excludes_and_prefixes() {
        let temp = TempDir::new().unwrap();
        let exclude = PatternSet::new(["./deno.json", "./importMap*.json"]).unwrap();
        let manifest = Manifest::from_sources(&sources(temp.path()), &exclude, "/");

        assert_eq!(
            manifest.entries(),
            &[
                ("./src/app.css".to_string(), "/src/app.abc123.css".to_string()),
                ("./public/favicon.ico".to_string(), "/public/favicon.ico".to_string()),
                ("./server.tsx".to_string(), "/server.tsx".to_string()),
            ]
        );
    }

    #[test]
    fn test_rewrite_only_touches_original_side() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::from_sources(&sources(temp.path()), &PatternSet::empty(), "/");
        manifest.rewrite("./public/", "./");
        assert_eq!(manifest.get("./favicon.ico"), Some("/public/favicon.ico"));
        assert_eq!(manifest.get("./public/favicon.ico"), None);
    }

    #[tokio::test]
    async fn test_removed_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        let mut sources = sources(temp.path());
        sources.get_mut("./server.tsx").unwrap().remove().await.unwrap();
        let manifest = Manifest::from_sources(&sources, &PatternSet::empty(), "/");
        assert!(manifest.get("./server.tsx").is_none());
        assert_eq!(manifest.len(), 4);
    }

    #[test]
    fn test_prefix_forms() {
        assert_eq!(with_prefix("/", "./a.css"), "/a.css");
        assert_eq!(with_prefix("/static", "./a.css"), "/static/a.css");
        assert_eq!(with_prefix("", "./a.css"), "a.css");
    }

    #[test]
    fn test_json_shape() {
        let manifest = Manifest {
            entries: vec![("./a.css".to_string(), "/a.1.css".to_string())],
        };
        assert_eq!(
            manifest.to_json().unwrap(),
            "[\n  [\n    \"./a.css\",\n    \"/a.1.css\"\n  ]\n]"
        );
    }
}
