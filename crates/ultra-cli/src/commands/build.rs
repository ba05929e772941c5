//! `ultra build`.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use ultra_build::{BuildPlugin, BuildReport, Builder, CommandCompiler, Compiler, PassthroughCompiler};

use crate::cli::BuildArgs;
use crate::config::UltraConfig;
use crate::error::{CliError, Result};
use crate::lock::BuildLock;
use crate::plugin::CommandPlugin;
use crate::ui;

/// Execute the build command.
///
/// 1. Load configuration (flags > env > file > defaults)
/// 2. Validate it into a build context
/// 3. Lock the output directory
/// 4. Run the pipeline
/// 5. Print the summary (or the JSON report with `--json`)
///
/// A failing plugin command is reported as a warning; the build still
/// succeeds because its output is complete.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let config = UltraConfig::load(&args)?;
    if let Some(path) = &config.config_file {
        tracing::info!(path = %path.display(), "loaded config file");
    }

    let compiler = compiler_for(config.compiler_command.as_deref())?;
    let plugin: Option<Arc<dyn BuildPlugin>> = config
        .plugin_command
        .as_deref()
        .map(|command| Arc::new(CommandPlugin::new(command)) as Arc<dyn BuildPlugin>);

    let context = config.options.into_context()?;
    let root = context.root.clone();
    let _lock = BuildLock::acquire(&context.output)?;

    ui::info(&format!(
        "Building {} into {}",
        root.display(),
        ui::display_path(&context.output, &root)
    ));
    let report = Builder::new(context, compiler)
        .run(plugin.as_deref())
        .await?;

    if let Some(err) = &report.plugin_error {
        ui::warning(&format!("{} (the build output is unaffected)", err));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report, &root))?);
    } else {
        ui::print_summary(&report, &root);
    }

    Ok(())
}

fn compiler_for(command: Option<&str>) -> Result<Arc<dyn Compiler>> {
    match command {
        Some(command) if command.trim().is_empty() => Err(CliError::InvalidArgument(
            "--compiler-command must name a program".to_string(),
        )),
        Some(command) => Ok(Arc::new(CommandCompiler::parse(command)?)),
        None => Ok(Arc::new(PassthroughCompiler)),
    }
}

fn report_json(report: &BuildReport, root: &Path) -> serde_json::Value {
    json!({
        "output": ui::display_path(&report.output, root),
        "manifestPath": ui::display_path(&report.manifest_path, root),
        "manifestEntries": report.manifest_entries(),
        "configPatched": report.config_patched,
        "results": report.results,
        "pluginError": report.plugin_error.as_ref().map(|e| e.to_string()),
        "durationMs": report.duration.as_millis() as u64,
    })
}
