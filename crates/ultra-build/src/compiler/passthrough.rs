use async_trait::async_trait;

use super::{CompileOutput, CompileRequest, Compiler, EmittedFile};
use crate::Result;
use crate::file::strip_logical;

/// Emits every input unchanged under the target directory.
///
/// The entry module comes first; each emitted file is linked back to the
/// source it was copied from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

#[async_trait]
impl Compiler for PassthroughCompiler {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn compile(&self, request: CompileRequest) -> Result<CompileOutput> {
        let (entry, rest): (Vec<_>, Vec<_>) = request
            .files
            .into_iter()
            .partition(|f| f.path == request.entrypoint);

        let files = entry
            .into_iter()
            .chain(rest)
            .map(|file| EmittedFile {
                path: strip_logical(&file.final_path).to_string(),
                contents: file.contents,
                source: Some(file.path),
            })
            .collect();

        Ok(CompileOutput { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompilerOptions, SourceFile, Target};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn source(path: &str, final_path: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            final_path: final_path.to_string(),
            contents: Arc::from(path.as_bytes().to_vec()),
        }
    }

    #[tokio::test]
    async fn test_entry_first_and_linked() {
        let request = CompileRequest {
            target: Target::browser(),
            entrypoint: "./client.tsx".to_string(),
            vendor_output_dir: "browser".to_string(),
            root: PathBuf::from("/out"),
            files: vec![
                source("./app.tsx", "./app.tsx"),
                source("./client.tsx", "./client.1234.tsx"),
            ],
            options: CompilerOptions::default(),
        };

        let output = PassthroughCompiler.compile(request).await.unwrap();
        let paths: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["client.1234.tsx", "app.tsx"]);
        assert_eq!(output.files[0].source.as_deref(), Some("./client.tsx"));
        assert_eq!(&*output.files[1].contents, b"./app.tsx");
    }
}
