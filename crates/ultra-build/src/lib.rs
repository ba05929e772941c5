//! # ultra-build
//!
//! Multi-target build pipeline: turns a source tree of application code and
//! static assets into a deployable output tree with separate artifact sets
//! for a browser target and a server target.
//!
//! The pipeline is strictly sequential:
//!
//! `Clean → Gather → Copy → Compile(×targets) → Prune → Manifest → PatchConfig → PluginHook → Done`
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ultra_build::{BuildOptions, PassthroughCompiler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = BuildOptions::new("./client.tsx", "./server.tsx").source_maps(true);
//!
//! let report = ultra_build::build(options, Arc::new(PassthroughCompiler), None).await?;
//! println!("built into {}", report.output.display());
//! # Ok(()) }
//! ```
//!
//! ### Driving the stages yourself
//!
//! ```no_run
//! use std::sync::Arc;
//! use ultra_build::{BuildOptions, Builder, PassthroughCompiler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = BuildOptions::new("./client.tsx", "./server.tsx").into_context()?;
//! let builder = Builder::new(context, Arc::new(PassthroughCompiler));
//!
//! builder.clean_output().await?;
//! let sources = builder.gather_sources().await?;
//! let mut build_sources = builder.copy_sources(&sources).await?;
//! let results = builder.build(&mut build_sources).await?;
//! # let _ = results;
//! # Ok(()) }
//! ```

pub mod builder;
pub mod compiler;
pub mod config_patch;
pub mod file;
pub mod glob;
pub mod hash;
pub mod options;
pub mod output;
pub mod plugin;
pub mod source;

pub use builder::{BuildReport, Builder, Stage, build};
pub use compiler::{
    BuildResult, CommandCompiler, CompileOutput, CompileRequest, Compiler, CompilerOptions,
    EmittedFile, Entrypoint, PassthroughCompiler, SourceFile, Target,
};
pub use config_patch::ConfigPatch;
pub use file::VirtualFile;
pub use glob::PatternSet;
pub use options::{
    BuildContext, BuildOptions, ConcurrencyPolicy, ManifestOptions, PartialBuildOptions,
    PartialCompilerOptions, PartialManifestOptions,
};
pub use output::manifest::Manifest;
pub use plugin::BuildPlugin;
pub use source::Sources;

use std::path::PathBuf;

/// Error types for ultra-build operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unreadable/unwritable path, permission failure or missing root.
    #[error("{message}")]
    Filesystem {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure while walking the source tree.
    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// Malformed glob pattern.
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A target's compiler invocation failed.
    #[error("Compilation failed for target '{target}': {message}")]
    Compile { target: String, message: String },

    /// A designated config artifact exists but is not valid structured data.
    #[error("Failed to parse {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// The plugin hook failed after the build completed.
    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Invalid output path (e.g., directory traversal attempt or collision).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),
}

/// Result type alias for ultra-build operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O error with a message naming the path involved.
    pub fn fs(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Filesystem {
            message: message.into(),
            source,
        }
    }

    /// Short stable identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Filesystem { .. } | Error::Walk(_) => "FILESYSTEM_ERROR",
            Error::Pattern { .. } => "PATTERN_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Compile { .. } => "COMPILE_ERROR",
            Error::ConfigParse { .. } => "CONFIG_PARSE_ERROR",
            Error::Plugin { .. } => "PLUGIN_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(self.kind()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        match self {
            Error::Plugin { .. } => Some(miette::Severity::Warning),
            _ => Some(miette::Severity::Error),
        }
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Pattern { .. } => Some(Box::new(
                "Patterns use gitignore syntax; `./` anchors a pattern to the project root and `+(a|b)` lists alternatives.",
            )),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your build options.\nError: {}",
                msg
            ))),
            Error::Compile { target, .. } => Some(Box::new(format!(
                "No output was published. Fix the '{}' compile error and rebuild.",
                target
            ))),
            Error::ConfigParse { path, .. } => Some(Box::new(format!(
                "'{}' must be valid JSON; the server build cannot be configured without it.",
                path.display()
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Compiled files must stay inside their target directory.",
                path
            ))),
            Error::Filesystem { .. } | Error::Walk(_) => {
                Some(Box::new("Check that the path exists and is readable/writable."))
            }
            Error::Plugin { .. } => None,
        }
    }
}
