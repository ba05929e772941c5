//! Shared test utilities for ultra-build integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use ultra_build::{
    BuildOptions, BuildPlugin, BuildResult, Builder, CompileOutput, CompileRequest, Compiler,
    EmittedFile, Error, PassthroughCompiler, Result,
};

/// 100 bytes of CSS.
pub const APP_CSS: &str =
    "body { margin: 0; font-family: system-ui, sans-serif; color: #111; background: #fafafa; }\n.app {}\n\n\n";

pub const DENO_JSON: &str =
    r#"{"compilerOptions":{"jsx":"react-jsxdev"},"importMap":"./importMap.json"}"#;

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().expect("file has a parent")).expect("create dirs");
    std::fs::write(path, contents).expect("write file");
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path.as_ref())
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.as_ref().display(), e))
}

/// The reference project: hashed CSS, two entrypoints, a runtime config and
/// the usual clutter that must never reach the output.
pub fn scenario_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    write(root, "src/app.css", APP_CSS);
    write(root, "server.tsx", "import App from './src/app.tsx';\nserve(App);\n");
    write(root, "client.tsx", "import App from './src/app.tsx';\nhydrate(App);\n");
    write(root, "src/app.tsx", "export default function App() { return null }\n");
    write(root, "deno.json", DENO_JSON);
    write(root, "importMap.json", r#"{"imports":{"react":"https://esm.sh/react"}}"#);
    write(root, "importMap.server.json", r#"{"imports":{"react":"https://esm.sh/react?target=deno"}}"#);
    write(root, "public/favicon.ico", "ico");
    write(root, "public/robots.txt", "User-agent: *\n");
    write(root, ".git/HEAD", "ref: refs/heads/main\n");
    write(root, "src/.DS_Store", "junk");
    dir
}

pub fn options(root: &Path) -> BuildOptions {
    BuildOptions::new("./client.tsx", "./server.tsx").root(root)
}

pub fn output_dir(root: &Path) -> PathBuf {
    root.join(".ultra")
}

/// Every file under `dir`, as `/`-separated paths relative to it.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .expect("inside dir")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

pub fn read_manifest(output: &Path) -> Vec<(String, String)> {
    serde_json::from_str(&read(output.join("asset-manifest.json"))).expect("manifest is JSON")
}

/// Passthrough compiler that records how many targets compile at once and
/// adds one unlinked vendor file per target.
#[derive(Debug)]
pub struct RecordingCompiler {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<String>>,
    fail_target: Option<String>,
    reentrant: bool,
    delay: Duration,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fail_target: None,
            reentrant: true,
            delay: Duration::from_millis(50),
        }
    }

    pub fn failing(mut self, target: &str) -> Self {
        self.fail_target = Some(target.to_string());
        self
    }

    pub fn non_reentrant(mut self) -> Self {
        self.reentrant = false;
        self
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Compiler for RecordingCompiler {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }

    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let target = request.target.to_string();
        self.calls.lock().expect("calls lock").push(target.clone());

        if self.fail_target.as_deref() == Some(target.as_str()) {
            return Err(Error::Compile {
                target,
                message: "unexpected token".to_string(),
            });
        }

        let mut output = PassthroughCompiler.compile(request).await?;
        output
            .files
            .push(EmittedFile::new("deps/runtime.js", target.into_bytes()));
        Ok(output)
    }
}

/// Plugin that records what it was given and optionally fails.
#[derive(Debug, Default)]
pub struct RecordingPlugin {
    pub seen: Mutex<Vec<BuildResult>>,
    pub output_had_manifest: Mutex<bool>,
    pub fail: bool,
}

#[async_trait]
impl BuildPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "recording-plugin"
    }

    async fn on_build(&self, builder: &Builder, results: &[BuildResult]) -> Result<()> {
        self.seen.lock().expect("seen lock").extend_from_slice(results);
        *self.output_had_manifest.lock().expect("manifest lock") =
            builder.context().output.join("asset-manifest.json").exists();
        if self.fail {
            return Err(Error::InvalidConfig("deploy target unreachable".to_string()));
        }
        Ok(())
    }
}

/// Bundler stand-in: every entry compiles to a stylesheet and a script,
/// both linked to the entry module.
#[derive(Debug, Default)]
pub struct BundlingCompiler;

#[async_trait]
impl Compiler for BundlingCompiler {
    fn name(&self) -> &str {
        "bundling"
    }

    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        let stem = Path::new(&request.entrypoint)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(CompileOutput {
            files: vec![
                EmittedFile::new(format!("{stem}.css"), APP_CSS)
                    .from_source(request.entrypoint.clone()),
                EmittedFile::new(format!("{stem}.js"), format!("// {}\n", request.target))
                    .from_source(request.entrypoint.clone()),
            ],
        })
    }
}
