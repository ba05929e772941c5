//! Command-line interface definition.
//!
//! - `ultra build` - build the project into its output directory

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Ultra - build React apps for Deno
#[derive(Parser, Debug)]
#[command(
    name = "ultra",
    version,
    about = "Build an Ultra application for deployment",
    long_about = "Ultra builds a source tree into a deployable output directory with a\n\
                  browser bundle, a server bundle, content-hashed assets and an asset manifest."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the project for production
    ///
    /// Copies the project into the output directory, fingerprints static
    /// assets, compiles the browser and server targets, writes the asset
    /// manifest and patches the runtime config.
    Build(BuildArgs),
}

/// Arguments for the build command.
///
/// Every option left unset falls back to `ULTRA_*` environment variables,
/// then `ultra.config.json`, then the built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Project root to build
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Output directory, relative to the project root
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Browser entrypoint, e.g. ./client.tsx
    #[arg(long = "browser-entry", value_name = "PATH")]
    pub browser_entrypoint: Option<String>,

    /// Server entrypoint, e.g. ./server.tsx
    #[arg(long = "server-entry", value_name = "PATH")]
    pub server_entrypoint: Option<String>,

    /// Extra exclude pattern (repeatable), added to the configured list
    #[arg(short = 'x', long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Emit source maps
    #[arg(long)]
    pub source_maps: bool,

    /// Skip minification
    #[arg(long)]
    pub no_minify: bool,

    /// Compile targets one at a time
    #[arg(long)]
    pub serial: bool,

    /// Compile with an external command instead of copying sources through
    ///
    /// Placeholders: {entrypoint}, {outdir}, {target}, {minify}, {sourcemap}
    #[arg(long, value_name = "CMD")]
    pub compiler_command: Option<String>,

    /// Shell command to run after a successful build
    ///
    /// Runs in the project root with ULTRA_OUTPUT set to the output directory.
    #[arg(long, value_name = "CMD")]
    pub plugin_command: Option<String>,

    /// Config file (defaults to <root>/ultra.config.json when present)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the build report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
