//! Logging setup for the Ultra CLI.
//!
//! The pipeline reports its stages as `tracing` events; this module installs
//! the subscriber that prints them.
//!
//! The level is chosen in this order:
//! 1. `--verbose`: DEBUG for the ultra crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. INFO for the ultra crates
//!
//! ```rust,no_run
//! use ultra_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("starting build");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "ultra_build=debug,ultra_cli=debug";
const QUIET_FILTER: &str = "error";
const DEFAULT_FILTER: &str = "ultra_build=info,ultra_cli=info";

/// Initialize the global tracing subscriber.
///
/// Call once, before anything logs. Events go to stderr so stdout stays
/// free for `--json` reports.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && crate::ui::should_use_color())
        .compact();

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter() {
        assert_eq!(filter_for(true, false).to_string(), EnvFilter::new(VERBOSE_FILTER).to_string());
    }

    #[test]
    fn test_verbose_wins_over_quiet() {
        let filter = filter_for(true, true).to_string();
        assert!(filter.contains("ultra_build=debug"), "{filter}");
    }

    #[test]
    fn test_quiet_filter() {
        assert_eq!(filter_for(false, true).to_string(), "error");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logger(false, true, true);
        init_logger(true, false, true);
    }
}
