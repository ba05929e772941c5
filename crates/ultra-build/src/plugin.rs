//! Post-build extension point.

use async_trait::async_trait;

use crate::Result;
use crate::builder::Builder;
use crate::compiler::BuildResult;

/// Runs once after the output tree is complete.
///
/// The hook sees the finished [`Builder`] (and through it the resolved
/// [`BuildContext`](crate::BuildContext)) plus every target's
/// [`BuildResult`]. A failing hook is reported but never unwinds the
/// published output.
///
/// ```
/// use async_trait::async_trait;
/// use ultra_build::{BuildPlugin, BuildResult, Builder, Result};
///
/// struct CountFiles;
///
/// #[async_trait]
/// impl BuildPlugin for CountFiles {
///     fn name(&self) -> &str {
///         "count-files"
///     }
///
///     async fn on_build(&self, builder: &Builder, results: &[BuildResult]) -> Result<()> {
///         let total: usize = results.iter().map(|r| r.files.len()).sum();
///         println!("{} files in {}", total, builder.context().output.display());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BuildPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn on_build(&self, builder: &Builder, results: &[BuildResult]) -> Result<()>;
}
