//! Build configuration.
//!
//! [`BuildOptions`] is the resolved configuration: every recognized option
//! with a concrete value. [`PartialBuildOptions`] mirrors it with every field
//! optional and is what configuration files deserialize into. Partial layers
//! are combined with [`PartialBuildOptions::merge`] and completed with
//! [`PartialBuildOptions::resolve`], both explicit field-by-field merges.
//!
//! [`BuildOptions::into_context`] validates everything and produces the
//! immutable [`BuildContext`] the [`Builder`](crate::Builder) runs on.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::compiler::{CompilerOptions, Entrypoint};
use crate::config_patch::ConfigPatch;
use crate::file::{normalize_logical, to_logical};
use crate::glob::PatternSet;
use crate::{Error, Result};

pub const DEFAULT_OUTPUT: &str = ".ultra";
pub const DEFAULT_MANIFEST_PATH: &str = "./asset-manifest.json";
pub const DEFAULT_DENO_CONFIG: &str = "./deno.json";
pub const DEFAULT_SERVER_IMPORT_MAP: &str = "./importMap.server.json";

pub fn default_exclude() -> Vec<String> {
    vec![".git".to_string(), "**/.DS_Store".to_string()]
}

/// The browser entrypoint is appended to these when the context is built.
pub fn default_hashed() -> Vec<String> {
    vec![
        "./src/**/*.+(ts|tsx|js|jsx|css)".to_string(),
        "./public/**/*.+(css|ico|webp|avif|jpg|png|svg|gif|otf|ttf|woff)".to_string(),
    ]
}

pub fn default_compiled() -> Vec<String> {
    vec!["./**/*.+(ts|tsx|js|jsx)".to_string()]
}

pub fn default_dev_only() -> Vec<String> {
    vec!["./importMap.json".to_string()]
}

/// How targets are scheduled during the compile stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Compile all targets at once (unless the compiler is not reentrant).
    #[default]
    Parallel,
    /// Compile targets one at a time, in declaration order.
    Serial,
}

/// Asset manifest generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOptions {
    /// Files never listed in the manifest.
    pub exclude: Vec<String>,
    /// Prepended to every final path (`/` turns `./a.css` into `/a.css`).
    pub prefix: String,
    /// `(from, to)` prefix rewrites applied to the original-path side.
    pub rewrite: Vec<(String, String)>,
    /// Where the manifest is written, relative to the output root.
    pub path: String,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            exclude: vec!["./deno.json".to_string(), "./importMap*.json".to_string()],
            prefix: "/".to_string(),
            rewrite: vec![("./public/".to_string(), "./".to_string())],
            path: DEFAULT_MANIFEST_PATH.to_string(),
        }
    }
}

/// Fully resolved build options.
///
/// ```
/// use ultra_build::{BuildOptions, ConcurrencyPolicy};
///
/// let options = BuildOptions::new("./client.tsx", "./server.tsx")
///     .output("dist")
///     .source_maps(true)
///     .concurrency(ConcurrencyPolicy::Serial);
///
/// assert_eq!(options.output, std::path::PathBuf::from("dist"));
/// assert!(options.minify);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Project root; relative roots resolve against the working directory.
    pub root: PathBuf,
    /// Output directory; relative paths resolve against `root`.
    pub output: PathBuf,
    pub exclude: Vec<String>,
    pub browser_entrypoint: String,
    pub server_entrypoint: String,
    pub source_maps: bool,
    pub minify: bool,
    pub hashed: Vec<String>,
    pub compiled: Vec<String>,
    /// Files deleted from the output after compiling.
    pub dev_only: Vec<String>,
    pub manifest: ManifestOptions,
    pub deno_config: String,
    pub server_import_map: String,
    pub concurrency: ConcurrencyPolicy,
    /// The script driving the build, kept out of the output.
    pub build_script: Option<String>,
    /// Targets compiled after the browser and server entrypoints.
    #[serde(default)]
    pub extra_entrypoints: Vec<Entrypoint>,
}

impl BuildOptions {
    pub fn new(browser_entrypoint: impl Into<String>, server_entrypoint: impl Into<String>) -> Self {
        Self {
            root: PathBuf::from("."),
            output: PathBuf::from(DEFAULT_OUTPUT),
            exclude: default_exclude(),
            browser_entrypoint: browser_entrypoint.into(),
            server_entrypoint: server_entrypoint.into(),
            source_maps: false,
            minify: true,
            hashed: default_hashed(),
            compiled: default_compiled(),
            dev_only: default_dev_only(),
            manifest: ManifestOptions::default(),
            deno_config: DEFAULT_DENO_CONFIG.to_string(),
            server_import_map: DEFAULT_SERVER_IMPORT_MAP.to_string(),
            concurrency: ConcurrencyPolicy::default(),
            build_script: None,
            extra_entrypoints: Vec::new(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Replace the exclusion list (the defaults are dropped).
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    pub fn minify(mut self, enabled: bool) -> Self {
        self.minify = enabled;
        self
    }

    pub fn hashed<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashed = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn compiled<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compiled = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn dev_only<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dev_only = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn manifest(mut self, manifest: ManifestOptions) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn deno_config(mut self, path: impl Into<String>) -> Self {
        self.deno_config = path.into();
        self
    }

    pub fn server_import_map(mut self, path: impl Into<String>) -> Self {
        self.server_import_map = path.into();
        self
    }

    pub fn concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = policy;
        self
    }

    pub fn build_script(mut self, path: impl Into<String>) -> Self {
        self.build_script = Some(path.into());
        self
    }

    /// Add a target. Its vendor directory must not overlap any other
    /// target's; this is checked by [`into_context`](Self::into_context).
    pub fn entrypoint(mut self, entrypoint: Entrypoint) -> Self {
        self.extra_entrypoints.push(entrypoint);
        self
    }

    /// Validate and resolve into a [`BuildContext`].
    ///
    /// Nothing touches the filesystem here beyond reading the working
    /// directory; pattern and path errors surface before any output is
    /// cleaned.
    pub fn into_context(self) -> Result<BuildContext> {
        if self.browser_entrypoint.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "browserEntrypoint is required".to_string(),
            ));
        }
        if self.server_entrypoint.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "serverEntrypoint is required".to_string(),
            ));
        }

        let root = absolutize(&self.root)?;
        let output = if self.output.is_absolute() {
            self.output.clean()
        } else {
            root.join(&self.output).clean()
        };

        if output == root || root.starts_with(&output) {
            return Err(Error::InvalidOutputPath(format!(
                "output directory '{}' would delete the project root '{}'",
                output.display(),
                root.display()
            )));
        }

        let mut entrypoints = vec![
            Entrypoint::browser(&self.browser_entrypoint),
            Entrypoint::server(&self.server_entrypoint),
        ];
        entrypoints.extend(self.extra_entrypoints.iter().map(|entry| Entrypoint {
            path: normalize_logical(&entry.path),
            ..entry.clone()
        }));
        validate_entrypoints(&entrypoints)?;

        let mut exclude = self.exclude.clone();
        if let Some(script) = &self.build_script {
            exclude.push(normalize_logical(script));
        }
        if let Ok(relative) = output.strip_prefix(&root) {
            exclude.push(to_logical(relative));
        }
        let lock = lock_path(&output);
        if let Ok(relative) = lock.strip_prefix(&root) {
            exclude.push(to_logical(relative));
        }

        let mut hashed = self.hashed.clone();
        hashed.push(entrypoints[0].path.clone());

        let manifest_path = normalize_logical(&self.manifest.path);
        let mut manifest_exclude = self.manifest.exclude.clone();
        manifest_exclude.push(manifest_path.clone());

        Ok(BuildContext {
            root,
            output,
            entrypoints,
            exclude: PatternSet::new(&exclude)?,
            hashed: PatternSet::new(&hashed)?,
            compiled: PatternSet::new(&self.compiled)?,
            compiler: CompilerOptions {
                minify: self.minify,
                source_maps: self.source_maps,
            },
            concurrency: self.concurrency,
            dev_only: self.dev_only.iter().map(|p| normalize_logical(p)).collect(),
            manifest_exclude: PatternSet::new(&manifest_exclude)?,
            manifest_prefix: self.manifest.prefix.clone(),
            manifest_rewrite: self.manifest.rewrite.clone(),
            manifest_path,
            config_patch: ConfigPatch::new(&self.deno_config, &self.server_import_map),
        })
    }
}

/// `<output>.lock`, next to the output directory.
pub fn lock_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    output.with_file_name(name)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.clean());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::fs("Failed to read the current directory", e))?;
    Ok(cwd.join(path).clean())
}

fn validate_entrypoints(entrypoints: &[Entrypoint]) -> Result<()> {
    for (i, a) in entrypoints.iter().enumerate() {
        let dir = a.vendor_output_dir.trim_matches('/');
        if dir.is_empty() || dir.split('/').any(|part| part == ".." || part == ".") {
            return Err(Error::InvalidConfig(format!(
                "invalid vendor output directory '{}' for target '{}'",
                a.vendor_output_dir, a.target
            )));
        }

        for b in &entrypoints[i + 1..] {
            if a.target == b.target {
                return Err(Error::InvalidConfig(format!(
                    "target '{}' is declared twice",
                    a.target
                )));
            }
            let other = b.vendor_output_dir.trim_matches('/');
            let nested = dir == other
                || dir.starts_with(&format!("{}/", other))
                || other.starts_with(&format!("{}/", dir));
            if nested {
                return Err(Error::InvalidConfig(format!(
                    "targets '{}' and '{}' share vendor output directory '{}'",
                    a.target, b.target, a.vendor_output_dir
                )));
            }
            if a.relocate && b.relocate && a.path == b.path {
                return Err(Error::InvalidConfig(format!(
                    "entrypoint '{}' cannot be relocated by two targets",
                    a.path
                )));
            }
        }
    }
    Ok(())
}

/// Immutable configuration of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub root: PathBuf,
    pub output: PathBuf,
    /// In declaration order: browser, server, then any extra targets.
    pub entrypoints: Vec<Entrypoint>,
    pub exclude: PatternSet,
    pub hashed: PatternSet,
    pub compiled: PatternSet,
    pub compiler: CompilerOptions,
    pub concurrency: ConcurrencyPolicy,
    pub dev_only: Vec<String>,
    pub manifest_exclude: PatternSet,
    pub manifest_prefix: String,
    pub manifest_rewrite: Vec<(String, String)>,
    pub manifest_path: String,
    pub config_patch: ConfigPatch,
}

/// Optional manifest options, one layer of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialManifestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl PartialManifestOptions {
    pub fn merge(self, over: Self) -> Self {
        Self {
            exclude: over.exclude.or(self.exclude),
            prefix: over.prefix.or(self.prefix),
            rewrite: over.rewrite.or(self.rewrite),
            path: over.path.or(self.path),
        }
    }

    pub fn resolve(self, defaults: ManifestOptions) -> ManifestOptions {
        ManifestOptions {
            exclude: self.exclude.unwrap_or(defaults.exclude),
            prefix: self.prefix.unwrap_or(defaults.prefix),
            rewrite: self.rewrite.unwrap_or(defaults.rewrite),
            path: self.path.unwrap_or(defaults.path),
        }
    }
}

/// Optional compiler flags, one layer of configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialCompilerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,
}

impl PartialCompilerOptions {
    pub fn merge(self, over: Self) -> Self {
        Self {
            minify: over.minify.or(self.minify),
            source_maps: over.source_maps.or(self.source_maps),
        }
    }
}

/// One layer of build configuration: every field optional.
///
/// ```
/// use ultra_build::PartialBuildOptions;
///
/// let file: PartialBuildOptions = serde_json::from_str(
///     r#"{ "browserEntrypoint": "./client.tsx", "serverEntrypoint": "./server.tsx",
///          "manifest": { "prefix": "/static/" } }"#,
/// ).unwrap();
/// let cli = PartialBuildOptions { source_maps: Some(true), ..Default::default() };
///
/// let options = file.merge(cli).resolve().unwrap();
/// assert!(options.source_maps);
/// assert_eq!(options.manifest.prefix, "/static/");
/// assert_eq!(options.manifest.path, "./asset-manifest.json");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialBuildOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_maps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minify: Option<bool>,
    /// Nested form of `minify`/`sourceMaps`; top-level fields win.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<PartialCompilerOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_only: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PartialManifestOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deno_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_import_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<ConcurrencyPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_entrypoints: Option<Vec<Entrypoint>>,
}

impl PartialBuildOptions {
    /// Layer `over` on top of `self`; set fields in `over` win, nested
    /// option groups merge field by field.
    pub fn merge(self, over: Self) -> Self {
        Self {
            root: over.root.or(self.root),
            output: over.output.or(self.output),
            exclude: over.exclude.or(self.exclude),
            browser_entrypoint: over.browser_entrypoint.or(self.browser_entrypoint),
            server_entrypoint: over.server_entrypoint.or(self.server_entrypoint),
            source_maps: over.source_maps.or(self.source_maps),
            minify: over.minify.or(self.minify),
            compiler: merge_nested(self.compiler, over.compiler, PartialCompilerOptions::merge),
            hashed: over.hashed.or(self.hashed),
            compiled: over.compiled.or(self.compiled),
            dev_only: over.dev_only.or(self.dev_only),
            manifest: merge_nested(self.manifest, over.manifest, PartialManifestOptions::merge),
            deno_config: over.deno_config.or(self.deno_config),
            server_import_map: over.server_import_map.or(self.server_import_map),
            concurrency: over.concurrency.or(self.concurrency),
            build_script: over.build_script.or(self.build_script),
            extra_entrypoints: over.extra_entrypoints.or(self.extra_entrypoints),
        }
    }

    /// Fill every unset field with its default.
    ///
    /// Fails if either entrypoint is missing.
    pub fn resolve(self) -> Result<BuildOptions> {
        let browser = self.browser_entrypoint.ok_or_else(|| {
            Error::InvalidConfig("browserEntrypoint is required".to_string())
        })?;
        let server = self.server_entrypoint.ok_or_else(|| {
            Error::InvalidConfig("serverEntrypoint is required".to_string())
        })?;

        let defaults = BuildOptions::new(browser, server);
        let compiler = self.compiler.unwrap_or_default();

        Ok(BuildOptions {
            root: self.root.unwrap_or(defaults.root),
            output: self.output.unwrap_or(defaults.output),
            exclude: self.exclude.unwrap_or(defaults.exclude),
            source_maps: self
                .source_maps
                .or(compiler.source_maps)
                .unwrap_or(defaults.source_maps),
            minify: self.minify.or(compiler.minify).unwrap_or(defaults.minify),
            hashed: self.hashed.unwrap_or(defaults.hashed),
            compiled: self.compiled.unwrap_or(defaults.compiled),
            dev_only: self.dev_only.unwrap_or(defaults.dev_only),
            manifest: self
                .manifest
                .unwrap_or_default()
                .resolve(defaults.manifest),
            deno_config: self.deno_config.unwrap_or(defaults.deno_config),
            server_import_map: self
                .server_import_map
                .unwrap_or(defaults.server_import_map),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            build_script: self.build_script.or(defaults.build_script),
            extra_entrypoints: self
                .extra_entrypoints
                .unwrap_or(defaults.extra_entrypoints),
            browser_entrypoint: defaults.browser_entrypoint,
            server_entrypoint: defaults.server_entrypoint,
        })
    }
}

fn merge_nested<T>(base: Option<T>, over: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (base, over) {
        (Some(base), Some(over)) => Some(merge(base, over)),
        (base, over) => over.or(base),
    }
}
