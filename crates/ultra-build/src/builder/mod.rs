//! The build orchestrator.
//!
//! [`Builder`] exposes each pipeline stage as its own method so callers can
//! drive the stages by hand; [`Builder::run`] (and the top-level
//! [`build`](crate::build)) sequences all of them.

mod pipeline;

pub use pipeline::{BuildReport, Stage, build};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::compiler::{
    BuildResult, CompileOutput, CompileRequest, Compiler, EmittedFile, Entrypoint, SourceFile,
};
use crate::file::{VirtualFile, strip_logical, to_logical};
use crate::options::{BuildContext, ConcurrencyPolicy};
use crate::output::{Manifest, Publisher, validate_output_path};
use crate::source::{self, Sources};
use crate::{Error, Result, hash};

/// Runs the pipeline stages over one [`BuildContext`].
#[derive(Debug, Clone)]
pub struct Builder {
    context: Arc<BuildContext>,
    compiler: Arc<dyn Compiler>,
}

impl Builder {
    pub fn new(context: BuildContext, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            context: Arc::new(context),
            compiler,
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn compiler(&self) -> &dyn Compiler {
        self.compiler.as_ref()
    }

    /// Empty the output directory. A missing directory is not an error.
    pub async fn clean_output(&self) -> Result<()> {
        let output = &self.context.output;
        match tokio::fs::remove_dir_all(output).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::fs(
                    format!("Failed to clean output directory '{}'", output.display()),
                    e,
                ));
            }
        }
        tokio::fs::create_dir_all(output).await.map_err(|e| {
            Error::fs(
                format!("Failed to create output directory '{}'", output.display()),
                e,
            )
        })
    }

    /// Snapshot the project root.
    pub async fn gather_sources(&self) -> Result<Sources> {
        let context = Arc::clone(&self.context);
        tokio::task::spawn_blocking(move || source::snapshot(&context.root, &context.exclude))
            .await
            .map_err(|e| Error::fs("Source walk task failed", std::io::Error::other(e)))?
    }

    /// Copy every source into the output root, hashing hash-eligible files.
    ///
    /// Files are copied concurrently; the returned collection keeps the
    /// snapshot order and is rooted at the output directory.
    pub async fn copy_sources(&self, sources: &Sources) -> Result<Sources> {
        let max_parallel = num_cpus::get().clamp(1, 8);
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut join_set = JoinSet::new();

        for (index, file) in sources.active().cloned().enumerate() {
            let context = Arc::clone(&self.context);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => copy_one(&context, file).await,
                    Err(e) => Err(Error::fs("Copy scheduler closed", std::io::Error::other(e))),
                };
                (index, result)
            });
        }

        let mut copied: Vec<Option<Result<VirtualFile>>> = Vec::new();
        copied.resize_with(join_set.len(), || None);
        while let Some(joined) = join_set.join_next().await {
            let (index, result) =
                joined.map_err(|e| Error::fs("Copy task failed", std::io::Error::other(e)))?;
            copied[index] = Some(result);
        }

        let mut build_sources = Sources::new();
        for result in copied.into_iter().flatten() {
            build_sources.insert(result?);
        }
        tracing::info!(files = build_sources.len(), "copied sources");
        Ok(build_sources)
    }

    /// Write one file into the output root at its final path.
    pub async fn copy_source(&self, file: &VirtualFile) -> Result<VirtualFile> {
        let mut source = file.clone();
        let contents = source.load().await?;
        let mut copy = source.rebased(&self.context.output);
        validate_output_path(&self.context.output, strip_logical(copy.final_path()))?;
        copy.write(contents.to_vec()).await?;
        Ok(copy)
    }

    /// Compile every target over `sources`.
    ///
    /// Nothing is written until all targets succeed. Emitted files land under
    /// `<output>/<vendorOutputDir>/` and are added to `sources`; a relocating
    /// target moves its entry module's final path to the compiled file.
    pub async fn build(&self, sources: &mut Sources) -> Result<Vec<BuildResult>> {
        let mut requests = Vec::with_capacity(self.context.entrypoints.len());
        for entry in &self.context.entrypoints {
            requests.push(self.compile_request(entry, sources).await?);
        }

        let outputs = self.run_compiler(requests).await?;
        let placed = self.place_outputs(&outputs, sources)?;

        let mut publisher = Publisher::new();
        for emitted in placed.iter().flatten() {
            if let Err(e) = publisher.write(&emitted.absolute, &emitted.contents).await {
                publisher.rollback().await;
                return Err(e);
            }
        }
        publisher.commit();

        // Copies superseded by a relocation, captured before any final path moves.
        let copies: Vec<Option<PathBuf>> = self
            .context
            .entrypoints
            .iter()
            .map(|entry| sources.get(&entry.path).map(VirtualFile::absolute_path))
            .collect();

        let mut results = Vec::with_capacity(placed.len());
        for ((entry, files), copy) in self.context.entrypoints.iter().zip(placed).zip(copies) {
            let mut paths = Vec::with_capacity(files.len());
            for emitted in files {
                paths.push(emitted.logical.clone());
                self.record_emitted(entry, emitted, copy.as_deref(), sources)
                    .await?;
            }
            tracing::info!(
                target_name = %entry.target,
                files = paths.len(),
                "compiled target"
            );
            results.push(BuildResult {
                target: entry.target.clone(),
                success: true,
                entrypoint: entry.path.clone(),
                compiler: self.compiler.name().to_string(),
                files: paths,
            });
        }

        Ok(results)
    }

    /// Delete the dev-only artifacts from the output.
    ///
    /// They stay in `sources`, marked removed. Returns the paths removed.
    pub async fn prune(&self, sources: &mut Sources) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for path in &self.context.dev_only {
            if let Some(file) = sources.get_mut(path) {
                if file.is_removed() {
                    continue;
                }
                file.remove().await?;
                removed.push(file.path().to_string());
            }
        }
        Ok(removed)
    }

    /// The asset manifest for `sources`, with exclusions and rewrites applied.
    pub fn to_manifest(&self, sources: &Sources) -> Manifest {
        let mut manifest = Manifest::from_sources(
            sources,
            &self.context.manifest_exclude,
            &self.context.manifest_prefix,
        );
        for (from, to) in &self.context.manifest_rewrite {
            manifest.rewrite(from, to);
        }
        manifest
    }

    async fn compile_request(
        &self,
        entry: &Entrypoint,
        sources: &mut Sources,
    ) -> Result<CompileRequest> {
        match sources.get(&entry.path) {
            Some(file) if !file.is_removed() => {}
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "entrypoint '{}' for target '{}' was not found in '{}'",
                    entry.path,
                    entry.target,
                    self.context.root.display()
                )));
            }
        }

        let mut files = Vec::new();
        for file in sources.iter_mut() {
            if file.is_removed()
                || (file.path() != entry.path && !self.context.compiled.is_match(file.path()))
            {
                continue;
            }
            let contents = file.load().await?;
            files.push(SourceFile {
                path: file.path().to_string(),
                final_path: file.final_path().to_string(),
                contents,
            });
        }

        tracing::debug!(
            target_name = %entry.target,
            files = files.len(),
            "prepared compile request"
        );

        Ok(CompileRequest {
            target: entry.target.clone(),
            entrypoint: entry.path.clone(),
            vendor_output_dir: entry.vendor_output_dir.clone(),
            root: self.context.output.clone(),
            files,
            options: self.context.compiler,
        })
    }

    async fn run_compiler(&self, requests: Vec<CompileRequest>) -> Result<Vec<CompileOutput>> {
        let parallel = self.context.concurrency == ConcurrencyPolicy::Parallel
            && self.compiler.is_reentrant();

        if !parallel {
            let mut outputs = Vec::with_capacity(requests.len());
            for request in requests {
                outputs.push(self.compiler.compile(request).await?);
            }
            return Ok(outputs);
        }

        let mut join_set = JoinSet::new();
        let count = requests.len();
        for (index, request) in requests.into_iter().enumerate() {
            let compiler = Arc::clone(&self.compiler);
            join_set.spawn(async move { (index, compiler.compile(request).await) });
        }

        // Wait for every target so no compiler is left running, then report
        // the first failure in declaration order.
        let mut outputs: Vec<Option<Result<CompileOutput>>> = Vec::new();
        outputs.resize_with(count, || None);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => outputs[index] = Some(result),
                Err(e) => {
                    return Err(Error::Compile {
                        target: "unknown".to_string(),
                        message: format!("compile task panicked: {}", e),
                    });
                }
            }
        }

        outputs.into_iter().flatten().collect()
    }

    fn place_outputs(
        &self,
        outputs: &[CompileOutput],
        sources: &Sources,
    ) -> Result<Vec<Vec<PlacedFile>>> {
        let output_root = &self.context.output;
        let mut seen = rustc_hash::FxHashSet::default();
        let mut placed = Vec::with_capacity(outputs.len());

        for (entry, output) in self.context.entrypoints.iter().zip(outputs) {
            let vendor_dir = output_root.join(&entry.vendor_output_dir);
            let relocated = if entry.relocate {
                relocation_index(entry, &output.files)
            } else {
                None
            };
            let mut files = Vec::with_capacity(output.files.len());
            for (index, emitted) in output.files.iter().enumerate() {
                let absolute = validate_output_path(&vendor_dir, &emitted.path)?;
                let logical = logical_in(output_root, &absolute)?;

                if sources.contains(&logical) {
                    return Err(Error::InvalidOutputPath(format!(
                        "'{}' compiled for target '{}' would overwrite a source file",
                        logical, entry.target
                    )));
                }
                if !seen.insert(logical.clone()) {
                    return Err(Error::InvalidOutputPath(format!(
                        "'{}' was emitted twice",
                        logical
                    )));
                }

                files.push(PlacedFile {
                    logical,
                    absolute,
                    contents: emitted.contents.to_vec(),
                    relocates: relocated == Some(index),
                });
            }
            placed.push(files);
        }

        Ok(placed)
    }

    async fn record_emitted(
        &self,
        entry: &Entrypoint,
        emitted: PlacedFile,
        copy: Option<&Path>,
        sources: &mut Sources,
    ) -> Result<()> {
        if emitted.relocates {
            if let (Some(file), Some(stale)) = (sources.get_mut(&entry.path), copy) {
                // The copied entry module is superseded by its compiled form.
                match tokio::fs::remove_file(stale).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(Error::fs(
                            format!("Failed to remove '{}'", stale.display()),
                            e,
                        ));
                    }
                }
                tracing::debug!(path = %entry.path, final_path = %emitted.logical, "relocated");
                file.set_final_path(emitted.logical);
                return Ok(());
            }
        }

        sources.insert(VirtualFile::new(
            &emitted.logical,
            &self.context.output,
            emitted.contents,
        ));
        Ok(())
    }
}

/// An emitted file with its validated location.
#[derive(Debug)]
struct PlacedFile {
    logical: String,
    absolute: PathBuf,
    contents: Vec<u8>,
    relocates: bool,
}

const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

/// The emitted file an entry module relocates to.
///
/// Several files may be linked to the entry (a script and its stylesheet);
/// only one takes over the entry's final path, preferring a script.
fn relocation_index(entry: &Entrypoint, files: &[EmittedFile]) -> Option<usize> {
    let linked = || {
        files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.source.as_deref() == Some(entry.path.as_str()))
    };
    let is_script = |file: &EmittedFile| {
        Path::new(&file.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
    };

    linked()
        .find(|&(_, file)| is_script(file))
        .or_else(|| linked().next())
        .map(|(index, _)| index)
}

fn logical_in(root: &Path, absolute: &Path) -> Result<String> {
    absolute
        .strip_prefix(root)
        .map(to_logical)
        .map_err(|_| Error::InvalidOutputPath(absolute.display().to_string()))
}

async fn copy_one(context: &BuildContext, mut file: VirtualFile) -> Result<VirtualFile> {
    let contents = file.load().await?;
    let mut copy = file.rebased(&context.output);

    if context.hashed.is_match(copy.path()) {
        hash::apply(&mut copy).await?;
    }

    validate_output_path(&context.output, strip_logical(copy.final_path()))?;
    copy.write(contents.to_vec()).await?;
    tracing::trace!(path = %copy.path(), final_path = %copy.final_path(), "copied");
    Ok(copy)
}
