//! Pipeline error handling.
//!
//! When a step fails, the pipeline does not propagate a panic or abort the
//! process. It hands the [`TransformError`] to its [`Handler`] and asks what
//! to do next. The default handler, [`plumber`], logs the failure and ends
//! the pipeline, so a long running watch session survives a single bad file.

use crate::error::TransformError;

/// What a pipeline does after one of its steps failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Stop the current pipeline; nothing after the failing step runs.
    End,
    /// Skip the failing step and feed its input to the next stage.
    Continue,
}

/// Error handler invoked by a pipeline for every failing step.
pub type Handler = fn(&TransformError) -> Completion;

/// Logs the failure and ends the current pipeline.
pub fn plumber(err: &TransformError) -> Completion {
    match &err.path {
        Some(path) => tracing::error!(step = err.step, file = %path, "{err}"),
        None => tracing::error!(step = err.step, "{err}"),
    }
    Completion::End
}

/// Logs the failure as a warning and carries on without the step.
pub fn tolerant(err: &TransformError) -> Completion {
    tracing::warn!(step = err.step, "{err}, skipping step");
    Completion::Continue
}
