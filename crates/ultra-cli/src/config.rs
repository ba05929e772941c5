//! Layered configuration for `ultra build`.
//!
//! Priority: CLI flags > `ULTRA_*` environment variables > `ultra.config.json`
//! > built-in defaults. The file and environment layers use the camelCase
//! option names of [`PartialBuildOptions`]; nested groups are reached from the
//! environment with a double underscore (`ULTRA_MANIFEST__PREFIX=/static/`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format as _, Json, Serialized};
use figment::value::{Uncased, UncasedStr};
use figment::{Figment, Provider};
use ultra_build::file::to_logical;
use ultra_build::{BuildOptions, ConcurrencyPolicy, PartialBuildOptions};

use crate::cli::BuildArgs;
use crate::error::{ConfigError, Result};

/// Config file looked up in the project root.
pub const CONFIG_FILE: &str = "ultra.config.json";

/// Prefix of the environment layer.
pub const ENV_PREFIX: &str = "ULTRA_";

const TOP_LEVEL_KEYS: &[&str] = &[
    "root",
    "output",
    "exclude",
    "browserEntrypoint",
    "serverEntrypoint",
    "sourceMaps",
    "minify",
    "hashed",
    "compiled",
    "devOnly",
    "denoConfig",
    "serverImportMap",
    "concurrency",
    "buildScript",
    "extraEntrypoints",
];
const MANIFEST_KEYS: &[&str] = &["exclude", "prefix", "rewrite", "path"];
const COMPILER_KEYS: &[&str] = &["minify", "sourceMaps"];

/// Everything `ultra build` needs after all layers are applied.
#[derive(Debug, Clone)]
pub struct UltraConfig {
    pub options: BuildOptions,
    /// The config file that was read, if any.
    pub config_file: Option<PathBuf>,
    pub compiler_command: Option<String>,
    pub plugin_command: Option<String>,
}

impl UltraConfig {
    /// Load configuration for `args` from the config file, the process
    /// environment and the flags.
    pub fn load(args: &BuildArgs) -> Result<Self> {
        let env = Env::prefixed(ENV_PREFIX)
            .filter_map(|key| env_key(key))
            .lowercase(false);
        Self::load_with_env(args, env)
    }

    /// Like [`load`](Self::load) with an explicit provider standing in for
    /// the environment layer.
    pub fn load_with_env(args: &BuildArgs, env: impl Provider) -> Result<Self> {
        let config_file = locate_config_file(args)?;

        let mut figment = Figment::new();
        if let Some(path) = &config_file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Json::file(path));
        }
        figment = figment
            .merge(env)
            .merge(Serialized::defaults(cli_layer(args)));

        let partial: PartialBuildOptions =
            figment.extract().map_err(|e| ConfigError::InvalidValue {
                value: e.to_string(),
                hint: format!(
                    "Check {} and {}* variables against the documented option names",
                    config_file
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| CONFIG_FILE.to_string()),
                    ENV_PREFIX
                ),
            })?;

        let mut options = partial.resolve().map_err(|e| ConfigError::MissingField {
            message: e.to_string(),
            hint: "Pass --browser-entry and --server-entry or set browserEntrypoint and serverEntrypoint in ultra.config.json".to_string(),
        })?;
        for pattern in &args.exclude {
            options = options.add_exclude(pattern.clone());
        }
        // The config file drives the build; it is never shipped.
        if let Some(path) = config_file.as_deref().and_then(|file| logical_in(&options.root, file)) {
            options = options.add_exclude(path);
        }

        Ok(Self {
            options,
            config_file,
            compiler_command: args.compiler_command.clone(),
            plugin_command: args.plugin_command.clone(),
        })
    }
}

fn locate_config_file(args: &BuildArgs) -> Result<Option<PathBuf>> {
    if let Some(path) = &args.config {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.clone()).into());
        }
        return Ok(Some(path.clone()));
    }

    let root = args.root.as_deref().unwrap_or_else(|| Path::new("."));
    let default_path = root.join(CONFIG_FILE);
    Ok(default_path.is_file().then_some(default_path))
}

/// `file` as a logical path under `root`, if it lies inside it.
fn logical_in(root: &Path, file: &Path) -> Option<String> {
    let root = std::path::absolute(root).ok()?;
    let file = std::path::absolute(file).ok()?;
    file.strip_prefix(&root).ok().map(to_logical)
}

/// Flags the user actually passed; unset flags leave lower layers alone.
fn cli_layer(args: &BuildArgs) -> PartialBuildOptions {
    PartialBuildOptions {
        root: args.root.clone(),
        output: args.output.clone(),
        browser_entrypoint: args.browser_entrypoint.clone(),
        server_entrypoint: args.server_entrypoint.clone(),
        source_maps: args.source_maps.then_some(true),
        minify: args.no_minify.then_some(false),
        concurrency: args.serial.then_some(ConcurrencyPolicy::Serial),
        ..Default::default()
    }
}

/// Map `BROWSER_ENTRYPOINT` to `browserEntrypoint` and `MANIFEST__PREFIX` to
/// `manifest.prefix`. Unknown variables are ignored.
fn env_key(key: &UncasedStr) -> Option<Uncased<'static>> {
    let mut segments = key.as_str().split("__");
    let first = segments.next()?;
    let nested = segments.next();
    if segments.next().is_some() {
        return None;
    }

    match nested {
        None => find_key(TOP_LEVEL_KEYS, first).map(Uncased::from_borrowed),
        Some(child) => {
            let (parent, children) = if first.eq_ignore_ascii_case("manifest") {
                ("manifest", MANIFEST_KEYS)
            } else if first.eq_ignore_ascii_case("compiler") {
                ("compiler", COMPILER_KEYS)
            } else {
                return None;
            };
            find_key(children, child).map(|child| Uncased::from_owned(format!("{parent}.{child}")))
        }
    }
}

fn find_key(keys: &[&'static str], raw: &str) -> Option<&'static str> {
    let flat: String = raw.chars().filter(|c| *c != '_').collect();
    keys.iter().copied().find(|key| key.eq_ignore_ascii_case(&flat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env() -> Serialized<PartialBuildOptions> {
        Serialized::defaults(PartialBuildOptions::default())
    }

    fn args_in(root: &Path) -> BuildArgs {
        BuildArgs {
            root: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_env_key_mapping() {
        let key = |raw: &str| env_key(UncasedStr::new(raw)).map(|k| k.as_str().to_string());

        assert_eq!(key("browser_entrypoint").as_deref(), Some("browserEntrypoint"));
        assert_eq!(key("OUTPUT").as_deref(), Some("output"));
        assert_eq!(key("dev_only").as_deref(), Some("devOnly"));
        assert_eq!(key("manifest__prefix").as_deref(), Some("manifest.prefix"));
        assert_eq!(key("compiler__source_maps").as_deref(), Some("compiler.sourceMaps"));
        assert_eq!(key("home"), None);
        assert_eq!(key("manifest__nope"), None);
        assert_eq!(key("a__b__c"), None);
    }

    #[test]
    fn test_file_layer_is_read_from_root() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{
                "browserEntrypoint": "./client.tsx",
                "serverEntrypoint": "./server.tsx",
                "output": "dist",
                "manifest": { "prefix": "/static/" }
            }"#,
        )
        .unwrap();

        let config = UltraConfig::load_with_env(&args_in(temp.path()), no_env()).unwrap();
        assert_eq!(config.config_file, Some(temp.path().join(CONFIG_FILE)));
        assert_eq!(config.options.output, PathBuf::from("dist"));
        assert_eq!(config.options.manifest.prefix, "/static/");
        assert_eq!(config.options.manifest.path, "./asset-manifest.json");
        assert_eq!(config.options.root, temp.path());
    }

    #[test]
    fn test_config_file_is_excluded_from_the_build() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{ "browserEntrypoint": "./c.tsx", "serverEntrypoint": "./s.tsx" }"#,
        )
        .unwrap();

        let config = UltraConfig::load_with_env(&args_in(temp.path()), no_env()).unwrap();
        assert_eq!(config.options.exclude.last().map(String::as_str), Some("./ultra.config.json"));

        let outside = TempDir::new().unwrap();
        let shared = outside.path().join("shared.json");
        fs::write(&shared, r#"{ "browserEntrypoint": "./c.tsx", "serverEntrypoint": "./s.tsx" }"#)
            .unwrap();
        let args = BuildArgs {
            config: Some(shared),
            ..args_in(temp.path())
        };
        let config = UltraConfig::load_with_env(&args, no_env()).unwrap();
        assert_eq!(config.options.exclude, vec![".git", "**/.DS_Store"]);
    }

    #[test]
    fn test_layer_priority() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{
                "browserEntrypoint": "./client.tsx",
                "serverEntrypoint": "./server.tsx",
                "output": "from-file",
                "minify": true,
                "concurrency": "parallel"
            }"#,
        )
        .unwrap();

        let env = Serialized::defaults(PartialBuildOptions {
            output: Some(PathBuf::from("from-env")),
            concurrency: Some(ConcurrencyPolicy::Serial),
            ..Default::default()
        });
        let args = BuildArgs {
            output: Some(PathBuf::from("from-cli")),
            no_minify: true,
            exclude: vec!["./drafts".to_string()],
            ..args_in(temp.path())
        };

        let config = UltraConfig::load_with_env(&args, env).unwrap();
        assert_eq!(config.options.output, PathBuf::from("from-cli"));
        assert_eq!(config.options.concurrency, ConcurrencyPolicy::Serial);
        assert!(!config.options.minify);
        assert_eq!(config.options.exclude, vec![".git", "**/.DS_Store", "./drafts"]);
    }

    #[test]
    fn test_unknown_file_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{ "browserEntrypoint": "./c.tsx", "serverEntrypoint": "./s.tsx", "outDir": "x" }"#,
        )
        .unwrap();

        let err = UltraConfig::load_with_env(&args_in(temp.path()), no_env()).unwrap_err();
        assert!(err.to_string().contains("outDir"), "{err}");
    }

    #[test]
    fn test_missing_entrypoints() {
        let temp = TempDir::new().unwrap();
        let err = UltraConfig::load_with_env(&args_in(temp.path()), no_env()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("browserEntrypoint"), "{msg}");
        assert!(msg.contains("Hint:"), "{msg}");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp = TempDir::new().unwrap();
        let args = BuildArgs {
            config: Some(temp.path().join("missing.json")),
            ..args_in(temp.path())
        };
        let err = UltraConfig::load_with_env(&args, no_env()).unwrap_err();
        assert!(matches!(err, crate::CliError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_cli_layer_only_sets_passed_flags() {
        let layer = cli_layer(&BuildArgs::default());
        assert_eq!(layer, PartialBuildOptions::default());

        let layer = cli_layer(&BuildArgs {
            source_maps: true,
            serial: true,
            ..Default::default()
        });
        assert_eq!(layer.source_maps, Some(true));
        assert_eq!(layer.concurrency, Some(ConcurrencyPolicy::Serial));
        assert_eq!(layer.minify, None);
    }
}
