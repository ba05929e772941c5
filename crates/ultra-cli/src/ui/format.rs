//! Formatting for durations, paths and the completion summary.

use std::path::Path;
use std::time::Duration;

use owo_colors::OwoColorize;
use ultra_build::BuildReport;

use super::colors_enabled;

const DEPLOY_DOCS: &str = "https://ultrajs.dev/docs#deploying";

/// Format a duration as `50ms`, `1.50s` or `2m 30s`.
///
/// ```
/// use std::time::Duration;
/// use ultra_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// `path` relative to `base` when it lies inside it, otherwise as given.
pub fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .ok()
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Print the completion summary and the deploy instructions to stderr.
///
/// Paths are shown relative to `base` when possible.
pub fn print_summary(report: &BuildReport, base: &Path) {
    let output = display_path(&report.output, base);

    super::success(&format!(
        "Build complete in {}",
        format_duration(report.duration)
    ));
    for result in &report.results {
        let line = format!("{:<8} {} files", result.target.as_str(), result.files.len());
        if colors_enabled() {
            eprintln!("  {} {}", "▸".blue(), line);
        } else {
            eprintln!("  ▸ {}", line);
        }
    }
    let manifest = format!(
        "{:<8} {} entries in {}",
        "manifest",
        report.manifest_entries(),
        display_path(&report.manifest_path, base)
    );
    if colors_enabled() {
        eprintln!("  {} {}", "▸".blue(), manifest);
    } else {
        eprintln!("  ▸ {}", manifest);
    }

    eprintln!();
    eprintln!(
        "You can now deploy the \"{}\" output directory to a platform of your choice.",
        output
    );
    eprintln!(
        "Instructions for common deployment platforms can be found at {}.",
        DEPLOY_DOCS
    );
    eprintln!();
    if colors_enabled() {
        eprintln!(
            "Alternatively, you can cd into \"{}\" and run: {}",
            output,
            "deno task start".bold()
        );
    } else {
        eprintln!(
            "Alternatively, you can cd into \"{}\" and run: deno task start",
            output
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(2250)), "2.25s");
        assert_eq!(format_duration(Duration::from_secs(150)), "2m 30s");
    }

    #[test]
    fn test_display_path() {
        let base = PathBuf::from("/work/app");
        assert_eq!(display_path(&base.join(".ultra"), &base), ".ultra");
        assert_eq!(display_path(Path::new("/work/dist"), &base), "/work/dist");
        assert_eq!(display_path(&base, &base), "/work/app");
    }
}
