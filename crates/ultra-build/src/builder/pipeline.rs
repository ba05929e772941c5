use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use super::Builder;
use crate::compiler::{BuildResult, Compiler};
use crate::options::BuildOptions;
use crate::output::Manifest;
use crate::plugin::BuildPlugin;
use crate::{Error, Result};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clean,
    Gather,
    Copy,
    Compile,
    Prune,
    Manifest,
    PatchConfig,
    PluginHook,
    Done,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Clean,
        Stage::Gather,
        Stage::Copy,
        Stage::Compile,
        Stage::Prune,
        Stage::Manifest,
        Stage::PatchConfig,
        Stage::PluginHook,
        Stage::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Gather => "gather",
            Stage::Copy => "copy",
            Stage::Compile => "compile",
            Stage::Prune => "prune",
            Stage::Manifest => "manifest",
            Stage::PatchConfig => "patch-config",
            Stage::PluginHook => "plugin-hook",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    /// Absolute output directory.
    pub output: PathBuf,
    /// One result per target, in declaration order.
    pub results: Vec<BuildResult>,
    pub manifest: Manifest,
    /// Absolute path of the written manifest.
    pub manifest_path: PathBuf,
    /// Whether the runtime config was found and patched.
    pub config_patched: bool,
    /// The plugin hook's failure, if it failed. The output is complete either way.
    pub plugin_error: Option<Error>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn manifest_entries(&self) -> usize {
        self.manifest.len()
    }

    /// Total files emitted across all targets.
    pub fn emitted_files(&self) -> usize {
        self.results.iter().map(|r| r.files.len()).sum()
    }
}

/// Validate `options` and run the whole pipeline.
///
/// ```no_run
/// use std::sync::Arc;
/// use ultra_build::{BuildOptions, PassthroughCompiler};
///
/// # #[tokio::main]
/// # async fn main() -> ultra_build::Result<()> {
/// let report = ultra_build::build(
///     BuildOptions::new("./client.tsx", "./server.tsx"),
///     Arc::new(PassthroughCompiler),
///     None,
/// )
/// .await?;
/// assert!(report.plugin_error.is_none());
/// # Ok(()) }
/// ```
pub async fn build(
    options: BuildOptions,
    compiler: Arc<dyn Compiler>,
    plugin: Option<Arc<dyn BuildPlugin>>,
) -> Result<BuildReport> {
    let context = options.into_context()?;
    Builder::new(context, compiler).run(plugin.as_deref()).await
}

impl Builder {
    /// Run every stage in order, stopping at the first failure.
    ///
    /// A failing plugin hook does not fail the build; its error is returned
    /// in [`BuildReport::plugin_error`].
    pub async fn run(&self, plugin: Option<&dyn BuildPlugin>) -> Result<BuildReport> {
        let started = Instant::now();
        let context = self.context();
        tracing::info!(
            root = %context.root.display(),
            output = %context.output.display(),
            compiler = self.compiler().name(),
            "starting build"
        );

        stage(Stage::Clean, self.clean_output()).await?;
        let sources = stage(Stage::Gather, self.gather_sources()).await?;
        tracing::info!(files = sources.len(), "gathered sources");

        let mut build_sources = stage(Stage::Copy, self.copy_sources(&sources)).await?;
        let results = stage(Stage::Compile, self.build(&mut build_sources)).await?;

        let removed = stage(Stage::Prune, self.prune(&mut build_sources)).await?;
        if !removed.is_empty() {
            tracing::info!(files = ?removed, "removed dev-only files");
        }

        let manifest = self.to_manifest(&build_sources);
        let manifest_file = stage(Stage::Manifest, async {
            tracing::info!(
                path = %context.manifest_path,
                entries = manifest.len(),
                "generating asset manifest"
            );
            let file = manifest.to_file(&context.manifest_path, &context.output)?;
            self.copy_source(&file).await
        })
        .await?;

        let patched = stage(Stage::PatchConfig, async {
            tracing::info!(path = %context.config_patch.path(), "patching runtime config");
            context.config_patch.apply(&mut build_sources).await
        })
        .await;
        let config_patched = match patched {
            Ok(patched) => patched,
            Err(e) => {
                // The manifest must not outlive a failed build.
                let mut manifest_file = manifest_file;
                if let Err(cleanup) = manifest_file.remove().await {
                    tracing::warn!(error = %cleanup, "failed to remove asset manifest");
                }
                return Err(e);
            }
        };

        let plugin_error = match plugin {
            Some(plugin) => stage(Stage::PluginHook, run_plugin(self, plugin, &results)).await,
            None => None,
        };

        let duration = started.elapsed();
        tracing::info!(stage = %Stage::Done, elapsed_ms = duration.as_millis() as u64, "build complete");

        Ok(BuildReport {
            output: context.output.clone(),
            results,
            manifest,
            manifest_path: manifest_file.absolute_path(),
            config_patched,
            plugin_error,
            duration,
        })
    }
}

async fn stage<F: Future>(stage: Stage, work: F) -> F::Output {
    tracing::debug!(stage = %stage, "entering stage");
    work.instrument(tracing::info_span!("stage", name = stage.as_str()))
        .await
}

async fn run_plugin(
    builder: &Builder,
    plugin: &dyn BuildPlugin,
    results: &[BuildResult],
) -> Option<Error> {
    tracing::info!(plugin = plugin.name(), "starting build plugin");
    match plugin.on_build(builder, results).await {
        Ok(()) => None,
        Err(e) => {
            let error = match e {
                Error::Plugin { .. } => e,
                other => Error::Plugin {
                    plugin: plugin.name().to_string(),
                    message: other.to_string(),
                },
            };
            tracing::warn!(error = %error, "build plugin failed; output is unaffected");
            Some(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(
            names,
            vec![
                "clean",
                "gather",
                "copy",
                "compile",
                "prune",
                "manifest",
                "patch-config",
                "plugin-hook",
                "done"
            ]
        );
        assert_eq!(Stage::PatchConfig.to_string(), "patch-config");
    }
}
