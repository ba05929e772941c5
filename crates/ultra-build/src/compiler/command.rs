use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::WalkDir;

use super::{CompileOutput, CompileRequest, Compiler, EmittedFile};
use crate::file::{strip_logical, to_logical};
use crate::{Error, Result};

/// Runs an external program once per target.
///
/// Arguments may contain placeholders that are substituted per request:
///
/// | placeholder    | value                                          |
/// |----------------|------------------------------------------------|
/// | `{entrypoint}` | absolute path of the copied entry module       |
/// | `{outdir}`     | empty staging directory for this target        |
/// | `{target}`     | target name (`browser`, `deno`)                |
/// | `{minify}`     | `true` / `false`                               |
/// | `{sourcemap}`  | `true` / `false`                               |
///
/// The program runs with the output root as its working directory. Every
/// file it leaves in `{outdir}` is emitted for the target; a file whose stem
/// matches the entry module's is linked to it.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    reentrant: bool,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            reentrant: true,
        }
    }

    /// Parse a command line (`esbuild {entrypoint} --outdir={outdir}`).
    ///
    /// Arguments are split with POSIX shell quoting rules, so
    /// `--define:x="a b"` stays one argument. Backslashes escape.
    pub fn parse(command_line: &str) -> Result<Self> {
        let parts = shlex::split(command_line).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "unbalanced quotes in compiler command '{}'",
                command_line
            ))
        })?;
        let mut parts = parts.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| Error::InvalidConfig("compiler command is empty".to_string()))?;
        Ok(Self::new(program).args(parts))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Mark the program unsafe to run for two targets at once.
    pub fn serial(mut self) -> Self {
        self.reentrant = false;
        self
    }

    fn expand(&self, arg: &str, request: &CompileRequest, entry: &Path, outdir: &Path) -> String {
        arg.replace("{entrypoint}", &entry.to_string_lossy())
            .replace("{outdir}", &outdir.to_string_lossy())
            .replace("{target}", request.target.as_str())
            .replace("{minify}", &request.options.minify.to_string())
            .replace("{sourcemap}", &request.options.source_maps.to_string())
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }

    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        let compile_error = |message: String| Error::Compile {
            target: request.target.to_string(),
            message,
        };

        let entry = request.entry_file().ok_or_else(|| {
            compile_error(format!("entrypoint '{}' is not in the request", request.entrypoint))
        })?;
        let entry_path = request.root.join(strip_logical(&entry.final_path));
        let entry_stem = Path::new(&entry.final_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());

        let staging = tempfile::TempDir::new()
            .map_err(|e| Error::fs("Failed to create compiler staging directory", e))?;

        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| self.expand(arg, &request, &entry_path, staging.path()))
            .collect();

        tracing::debug!(
            target_name = %request.target,
            program = %self.program,
            args = ?args,
            "running compiler command"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.root)
            .output()
            .await
            .map_err(|e| compile_error(format!("failed to run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(compile_error(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(staging.path()).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(staging.path()).map_err(|_| {
                Error::InvalidOutputPath(entry.path().display().to_string())
            })?;
            let contents = tokio::fs::read(entry.path()).await.map_err(|e| {
                Error::fs(format!("Failed to read '{}'", entry.path().display()), e)
            })?;

            let mut emitted =
                EmittedFile::new(strip_logical(&to_logical(relative)).to_string(), contents);
            let is_top_level = relative.components().count() == 1;
            let stem = relative.file_stem().map(|s| s.to_string_lossy());
            if is_top_level && stem.is_some() && stem.as_deref() == entry_stem.as_deref() {
                emitted = emitted.from_source(request.entrypoint.clone());
            }
            files.push(emitted);
        }

        Ok(CompileOutput { files })
    }
}
