//! Error handling for the Ultra CLI.
//!
//! [`CliError`] is what commands return. Pipeline failures keep their
//! [`ultra_build::Error`] so `main` can render them as diagnostics with the
//! library's codes and help text; everything else is printed with a hint.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is incomplete
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The build pipeline failed
    #[error(transparent)]
    Build(#[from] ultra_build::Error),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Another build holds the output directory
    #[error("Output directory is locked by another build{}: {}\n\nHint: Wait for the other build to finish, or delete the lock file if no build is running", holder(.pid), .path.display())]
    Locked { path: PathBuf, pid: Option<u32> },

    /// I/O errors outside the pipeline
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file doesn't exist
    #[error("Config file not found: {}\n\nHint: Create an ultra.config.json file or fix the --config path", .0.display())]
    NotFound(PathBuf),

    /// A layer holds an unknown option or a value of the wrong type
    #[error("{value}\n\nHint: {hint}")]
    InvalidValue { value: String, hint: String },

    /// A required option is set in no layer
    #[error("{message}\n\nHint: {hint}")]
    MissingField { message: String, hint: String },
}

fn holder(pid: &Option<u32>) -> String {
    pid.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Convert a [`CliError`] into a report for `main`.
///
/// Pipeline errors keep their diagnostic code and help.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Build(e) => miette::Report::new(e),
        other => miette::miette!("{}", other),
    }
}
