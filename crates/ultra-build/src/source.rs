//! Source tree snapshots.
//!
//! [`snapshot`] walks a root directory and produces an ordered [`Sources`]
//! collection, pruning excluded directories without descending into them.
//! Traversal is sorted by file name so two snapshots of an unchanged tree
//! list the same paths in the same order.

use std::path::Path;

use indexmap::IndexMap;
use walkdir::WalkDir;

use crate::file::{VirtualFile, normalize_logical, to_logical};
use crate::glob::PatternSet;
use crate::{Error, Result};

/// Ordered collection of [`VirtualFile`]s keyed by logical path.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    files: IndexMap<String, VirtualFile>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file. A file with the same logical path is replaced in place.
    pub fn insert(&mut self, file: VirtualFile) {
        self.files.insert(file.path().to_string(), file);
    }

    pub fn get(&self, path: &str) -> Option<&VirtualFile> {
        self.files.get(&normalize_logical(path))
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut VirtualFile> {
        self.files.get_mut(&normalize_logical(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_logical(path))
    }

    /// All files, including removed ones, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &VirtualFile> {
        self.files.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VirtualFile> {
        self.files.values_mut()
    }

    /// Files that have not been removed.
    pub fn active(&self) -> impl Iterator<Item = &VirtualFile> {
        self.files.values().filter(|f| !f.is_removed())
    }

    /// Logical paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<VirtualFile> for Sources {
    fn from_iter<T: IntoIterator<Item = VirtualFile>>(iter: T) -> Self {
        let mut sources = Sources::new();
        for file in iter {
            sources.insert(file);
        }
        sources
    }
}

impl IntoIterator for Sources {
    type Item = VirtualFile;
    type IntoIter = indexmap::map::IntoValues<String, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_values()
    }
}

/// Walk `root` and collect every file not matched by `exclude`.
///
/// Any unreadable entry fails the whole snapshot; partial snapshots are
/// never returned. Symlinks are followed, so a dangling link is an error.
pub fn snapshot(root: &Path, exclude: &PatternSet) -> Result<Sources> {
    let metadata = std::fs::metadata(root)
        .map_err(|e| Error::fs(format!("Source root '{}' is not readable", root.display()), e))?;
    if !metadata.is_dir() {
        return Err(Error::fs(
            format!("Source root '{}' is not a directory", root.display()),
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            match entry.path().strip_prefix(root) {
                Ok(relative) => !exclude.is_excluded(&to_logical(relative), entry.file_type().is_dir()),
                Err(_) => true,
            }
        });

    let mut sources = Sources::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).map_err(|_| {
            Error::InvalidOutputPath(format!(
                "'{}' is outside the source root '{}'",
                entry.path().display(),
                root.display()
            ))
        })?;
        let logical = to_logical(relative);
        tracing::trace!(path = %logical, "gathered");
        sources.insert(VirtualFile::from_disk(&logical, root));
    }

    Ok(sources)
}
