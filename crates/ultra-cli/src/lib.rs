//! Ultra CLI - builds an Ultra application into a deployable output tree.
//!
//! The CLI is a thin layer over [`ultra_build`]:
//!
//! - [`cli`] - clap argument definitions
//! - [`config`] - layered configuration (defaults, `ultra.config.json`, `ULTRA_*` env, flags)
//! - [`commands`] - command implementations
//! - [`error`] - CLI error types and their diagnostic rendering
//! - [`logger`] - `tracing` subscriber setup
//! - [`lock`] - single-build-per-output guard
//! - [`plugin`] - shell command run as the post-build plugin
//! - [`ui`] - status lines and the completion summary
//!
//! # Example
//!
//! ```rust,no_run
//! use ultra_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod lock;
pub mod logger;
pub mod plugin;
pub mod ui;

pub use error::{CliError, ConfigError, Result};
