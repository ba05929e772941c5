//! Compiler adapters.
//!
//! The pipeline decides *which* files are compiled and for *which* target;
//! a [`Compiler`] decides how. Each target gets one [`CompileRequest`] with
//! the compile-eligible subset of the copied sources plus its entrypoint,
//! and answers with a [`CompileOutput`] of files relative to that target's
//! vendor directory.

mod command;
mod passthrough;

pub use command::CommandCompiler;
pub use passthrough::PassthroughCompiler;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Runtime environment a set of artifacts is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn browser() -> Self {
        Self::new("browser")
    }

    /// Server-side target.
    pub fn deno() -> Self {
        Self::new("deno")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The root module compiled for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entrypoint {
    /// Logical path of the entry module (`./client.tsx`).
    pub path: String,
    pub target: Target,
    /// Subdirectory of the output root that receives this target's artifacts.
    pub vendor_output_dir: String,
    /// Move the entry module's final path to its compiled location.
    #[serde(default)]
    pub relocate: bool,
}

impl Entrypoint {
    pub fn new(path: &str, target: Target, vendor_output_dir: impl Into<String>) -> Self {
        Self {
            path: crate::file::normalize_logical(path),
            target,
            vendor_output_dir: vendor_output_dir.into(),
            relocate: false,
        }
    }

    /// Browser entry: compiled into `browser/` and served from there.
    pub fn browser(path: &str) -> Self {
        Self {
            relocate: true,
            ..Self::new(path, Target::browser(), "browser")
        }
    }

    /// Server entry: compiled into `server/`.
    pub fn server(path: &str) -> Self {
        Self::new(path, Target::deno(), "server")
    }
}

/// Options shared by every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub minify: bool,
    pub source_maps: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            minify: true,
            source_maps: false,
        }
    }
}

/// One input file of a compile request.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Logical path in the source tree.
    pub path: String,
    /// Path of the copy inside the output root (may carry a fingerprint).
    pub final_path: String,
    pub contents: Arc<[u8]>,
}

/// Everything a compiler needs to build one target.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub target: Target,
    /// Logical path of the entry module; always present in `files`.
    pub entrypoint: String,
    pub vendor_output_dir: String,
    /// Output root holding the copied sources.
    pub root: PathBuf,
    pub files: Vec<SourceFile>,
    pub options: CompilerOptions,
}

impl CompileRequest {
    /// The entry module's input file.
    pub fn entry_file(&self) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == self.entrypoint)
    }
}

/// A file produced by a compiler.
#[derive(Debug, Clone)]
pub struct EmittedFile {
    /// Path relative to the target's vendor directory.
    pub path: String,
    pub contents: Arc<[u8]>,
    /// Logical path of the input this file was compiled from, if any.
    pub source: Option<String>,
}

impl EmittedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: Arc::from(contents.into()),
            source: None,
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Result of compiling one target.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub files: Vec<EmittedFile>,
}

/// Per-target compilation summary, handed to the plugin hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub target: Target,
    pub success: bool,
    pub entrypoint: String,
    pub compiler: String,
    /// Output-relative paths of the emitted files (`./browser/client.js`).
    pub files: Vec<String>,
}

/// A per-target compiler.
///
/// ```
/// use async_trait::async_trait;
/// use ultra_build::{CompileOutput, CompileRequest, Compiler, EmittedFile, Result};
///
/// #[derive(Debug)]
/// struct Banner;
///
/// #[async_trait]
/// impl Compiler for Banner {
///     fn name(&self) -> &str {
///         "banner"
///     }
///
///     async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
///         let name = format!("{}.js", request.target);
///         Ok(CompileOutput {
///             files: vec![EmittedFile::new(name, "/* built */")],
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Compiler: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Whether two targets may be compiled at the same time.
    fn is_reentrant(&self) -> bool {
        true
    }

    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_entrypoints() {
        let browser = Entrypoint::browser("client.tsx");
        assert_eq!(browser.path, "./client.tsx");
        assert_eq!(browser.target, Target::browser());
        assert_eq!(browser.vendor_output_dir, "browser");
        assert!(browser.relocate);

        let server = Entrypoint::server("./server.tsx");
        assert_eq!(server.target.as_str(), "deno");
        assert_eq!(server.vendor_output_dir, "server");
        assert!(!server.relocate);
    }

    #[test]
    fn test_entry_file_lookup() {
        let request = CompileRequest {
            target: Target::browser(),
            entrypoint: "./client.tsx".to_string(),
            vendor_output_dir: "browser".to_string(),
            root: PathBuf::from("/out"),
            files: vec![SourceFile {
                path: "./client.tsx".to_string(),
                final_path: "./client.abc.tsx".to_string(),
                contents: Arc::from(b"x".to_vec()),
            }],
            options: CompilerOptions::default(),
        };
        assert_eq!(request.entry_file().unwrap().final_path, "./client.abc.tsx");
    }

    #[test]
    fn test_build_result_serializes_camel_case() {
        let result = BuildResult {
            target: Target::deno(),
            success: true,
            entrypoint: "./server.tsx".to_string(),
            compiler: "passthrough".to_string(),
            files: vec!["./server/server.tsx".to_string()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["target"], "deno");
        assert_eq!(json["files"][0], "./server/server.tsx");
    }
}
