//! Transform steps.
//!
//! A [`Step`] is a pure function from one [`FileSet`] to a new one. Steps own
//! their configuration, fixed when the step is built, and never touch the
//! output directories themselves: reading and writing files is the job of
//! the [`Pipeline`](crate::Pipeline) that hosts them. Steps that delegate to
//! an external program only talk to it through pipes or a private temporary
//! directory.
//!
//! A failing step returns a [`TransformError`], which the pipeline hands to
//! its error handler.

mod banner;
mod bump;
#[cfg(feature = "grass")]
mod css;
mod esbuild;
mod html;
mod lint;
mod text;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::TransformError;
use crate::fileset::{File, FileSet};

pub use banner::Banner;
pub use bump::{Bump, Level};
#[cfg(feature = "grass")]
pub use css::MinifyCss;
pub use esbuild::Esbuild;
pub use html::{MinifyHtml, TemplateCache};
pub use lint::Lint;
pub use text::{Concat, Footer, Header, Rename, Replace};

pub trait Step: Send + Sync {
    /// Short, stable name used in logs and errors.
    fn name(&self) -> &'static str;

    fn apply(&self, input: &FileSet) -> Result<FileSet, TransformError>;
}

/// Applies `f` to every entry in parallel, keeping the input order.
///
/// Errors returned by `f` are attributed to the entry being processed.
pub(crate) fn map_each<F>(step: &'static str, input: &FileSet, f: F) -> Result<FileSet, TransformError>
where
    F: Fn(&File) -> anyhow::Result<File> + Send + Sync,
{
    let files: Vec<File> = input
        .as_slice()
        .par_iter()
        .map(|file| f(file).map_err(|e| TransformError::new(step, Some(file.path.clone()), e)))
        .collect::<Result<_, _>>()?;

    Ok(files.into_iter().collect())
}

/// Like [`map_each`], but for steps that operate on text.
pub(crate) fn map_text<F>(step: &'static str, input: &FileSet, f: F) -> Result<FileSet, TransformError>
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    map_each(step, input, |file| {
        let text = file.text()?;
        Ok(file.with_data(f(text)?))
    })
}
