use camino::Utf8PathBuf;
use thiserror::Error;

/// A single transform step failed.
///
/// This is the only error the [`plumber`](crate::handler::plumber) sees. It
/// names the step and, when the failure can be pinned to one entry, the file.
#[derive(Debug, Error)]
#[error(
    "step `{step}` failed{}: {source}",
    .path.as_ref().map(|path| format!(" on {path}")).unwrap_or_default()
)]
pub struct TransformError {
    pub step: &'static str,
    pub path: Option<Utf8PathBuf>,
    #[source]
    pub source: anyhow::Error,
}

impl TransformError {
    pub fn new(
        step: &'static str,
        path: Option<Utf8PathBuf>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            step,
            path,
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("Couldn't read source file {0}.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't write {0}.\n{1}")]
    Write(Utf8PathBuf, std::io::Error),

    #[error("Pipeline `{0}` ended early.\n{1}")]
    Ended(String, TransformError),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task `{0}` is defined more than once")]
    Duplicate(String),

    #[error("Task `{parent}` refers to `{child}`, which is not defined")]
    Missing { parent: String, child: String },

    #[error("Task `{0}` is part of a cycle")]
    Cycle(String),

    #[error("Task `{0}` is not defined")]
    Unknown(String),
}

/// A task did not reach the `Succeeded` state.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task `{task}`:\n{source}")]
    Pipeline {
        task: String,
        #[source]
        source: PipelineError,
    },

    #[error("Task `{task}`:\n{source}")]
    Action {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task `{task}` panicked: {message}")]
    Panic { task: String, message: String },

    #[error("Task `{task}` failed because `{child}` failed")]
    Composition {
        task: String,
        child: String,
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    /// Name of the task this error was raised for.
    pub fn task(&self) -> &str {
        match self {
            TaskError::Pipeline { task, .. }
            | TaskError::Action { task, .. }
            | TaskError::Panic { task, .. }
            | TaskError::Composition { task, .. } => task,
        }
    }

    /// Follows `Composition` links down to the leaf that actually failed.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::Composition { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Couldn't start `{0}`.\n{1}")]
    Spawn(String, std::io::Error),

    #[error("`{tool}` exited with {}:\n{output}", .code.map(|c| format!("code {c}")).unwrap_or_else(|| "a signal".into()))]
    Status {
        tool: String,
        code: Option<i32>,
        output: String,
    },

    #[error("No command configured for {0}")]
    Missing(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read {0}.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse {0}.\n{1}")]
    Parse(Utf8PathBuf, serde_json::Error),

    #[error("Couldn't resolve project root.\n{0}")]
    Root(std::io::Error),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error("Couldn't resolve any of the watched paths: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}
