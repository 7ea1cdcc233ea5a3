//! Pipelines: sources, transform steps and sinks.
//!
//! A [`Pipeline`] reads an initial [`FileSet`] from its sources, then runs it
//! through an ordered list of stages. A stage is either a [`Step`] or a
//! [`Stage::Dest`] sink, which writes the current set to a directory and
//! passes it on unchanged, so a pipeline can write an intermediate artifact
//! and keep transforming it.
//!
//! ```rust,no_run
//! use plumb::Pipeline;
//! use plumb::step::{Concat, Header};
//!
//! let pipeline = Pipeline::new("lib")
//!     .src("src/common.js")
//!     .src("src/*.js")
//!     .pipe(Concat::new("lib.js"))
//!     .pipe(Header::new("/* lib */\n"))
//!     .dest("dist");
//!
//! let output = pipeline.run("my-project".as_ref())?;
//! # Ok::<(), plumb::PipelineError>(())
//! ```
//!
//! Sources are read in declaration order. Files matched by one glob are
//! sorted by path, and a file matched by several globs of the same pipeline
//! is read once, at its first match. [`Pipeline::merge`] forks the input: it
//! runs several sub-pipelines and concatenates their outputs, in order, as
//! the initial set of the outer pipeline.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::PipelineError;
use crate::fileset::{File, FileSet};
use crate::handler::{Completion, Handler, plumber};
use crate::io::as_overhead;
use crate::step::Step;

#[derive(Clone)]
enum Source {
    Glob(String),
    Pipeline(Box<Pipeline>),
}

#[derive(Clone)]
pub enum Stage {
    Step(Arc<dyn Step>),
    Dest(Utf8PathBuf),
}

#[derive(Clone)]
pub struct Pipeline {
    name: String,
    sources: Vec<Source>,
    base: Option<Utf8PathBuf>,
    stages: Vec<Stage>,
    handler: Handler,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            base: None,
            stages: Vec::new(),
            handler: plumber,
        }
    }

    /// Starts a pipeline whose input is the concatenated output of `inputs`.
    pub fn merge(name: impl Into<String>, inputs: impl IntoIterator<Item = Pipeline>) -> Self {
        let mut pipeline = Self::new(name);
        pipeline.sources = inputs
            .into_iter()
            .map(|input| Source::Pipeline(Box::new(input)))
            .collect();
        pipeline
    }

    /// Adds a glob source, relative to the project root.
    pub fn src(mut self, pattern: impl Into<String>) -> Self {
        self.sources.push(Source::Glob(pattern.into()));
        self
    }

    /// Overrides the directory source paths are made relative to. By default
    /// it is the static prefix of each glob.
    pub fn base(mut self, base: impl Into<Utf8PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn pipe(mut self, step: impl Step + 'static) -> Self {
        self.stages.push(Stage::Step(Arc::new(step)));
        self
    }

    /// Writes the current set under `dir`, relative to the project root.
    pub fn dest(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.stages.push(Stage::Dest(dir.into()));
        self
    }

    pub fn on_error(mut self, handler: Handler) -> Self {
        self.handler = handler;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Reads the sources and runs every stage.
    pub fn run(&self, root: &Utf8Path) -> Result<FileSet, PipelineError> {
        let start = Instant::now();

        let input = self.read(root)?;
        tracing::debug!(pipeline = %self.name, "read {} files", input.len());

        let output = self.apply(root, input)?;
        tracing::debug!(pipeline = %self.name, "finished {}", as_overhead(start));

        Ok(output)
    }

    /// Runs every stage over `input`, ignoring the sources.
    ///
    /// A failing step is passed to the error handler; when the handler
    /// answers [`Completion::End`] the pipeline stops and reports
    /// [`PipelineError::Ended`].
    pub fn apply(&self, root: &Utf8Path, input: FileSet) -> Result<FileSet, PipelineError> {
        let mut set = input;

        for stage in &self.stages {
            match stage {
                Stage::Step(step) => match step.apply(&set) {
                    Ok(next) => set = next,
                    Err(err) => match (self.handler)(&err) {
                        Completion::End => {
                            return Err(PipelineError::Ended(self.name.clone(), err));
                        }
                        Completion::Continue => {}
                    },
                },
                Stage::Dest(dir) => write(&root.join(dir), &set)?,
            }
        }

        Ok(set)
    }

    fn read(&self, root: &Utf8Path) -> Result<FileSet, PipelineError> {
        let mut set = FileSet::new();
        let mut seen = HashSet::new();

        for source in &self.sources {
            match source {
                Source::Glob(pattern) => {
                    let base = match &self.base {
                        Some(base) => base.clone(),
                        None => glob_base(pattern),
                    };

                    let full = format!("{}/{}", Pattern::escape(root.as_str()), pattern);

                    let mut paths = Vec::new();
                    for path in glob::glob(&full)? {
                        let path = Utf8PathBuf::try_from(path?)?;
                        if path.is_file() && seen.insert(path.clone()) {
                            paths.push(path);
                        }
                    }

                    let files: Vec<File> = paths
                        .into_par_iter()
                        .map(|path| {
                            let data = fs::read(&path).map_err(|e| PipelineError::Read(path.clone(), e))?;
                            let relative = path.strip_prefix(root).unwrap_or(&path);
                            let relative = relative.strip_prefix(&base).unwrap_or(relative);
                            Ok(File::new(relative, data))
                        })
                        .collect::<Result<_, PipelineError>>()?;

                    set = files.into_iter().fold(set, FileSet::with);
                }
                Source::Pipeline(inner) => {
                    set = set.chain(inner.run(root)?);
                }
            }
        }

        Ok(set)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<_> = self
            .stages
            .iter()
            .map(|stage| match stage {
                Stage::Step(step) => step.name().to_string(),
                Stage::Dest(dir) => format!("dest({dir})"),
            })
            .collect();

        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &stages)
            .finish_non_exhaustive()
    }
}

/// Splits a glob into its static prefix and the part holding wildcards.
///
/// `src/**/*.html` splits into `src` and `**/*.html`; a glob without
/// wildcards is all prefix.
pub(crate) fn split_glob(pattern: &str) -> (Utf8PathBuf, Utf8PathBuf) {
    let path = Utf8Path::new(pattern);
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let root = components.iter().take(split_idx).collect();
    let suffix = components.iter().skip(split_idx).collect();
    (root, suffix)
}

/// Directory that entries read through `pattern` are made relative to.
fn glob_base(pattern: &str) -> Utf8PathBuf {
    let (root, suffix) = split_glob(pattern);
    if suffix.as_str().is_empty() {
        root.parent().map(Utf8Path::to_path_buf).unwrap_or_default()
    } else {
        root
    }
}

/// Writes every entry of `set` under `dir`, creating directories as needed.
pub(crate) fn write(dir: &Utf8Path, set: &FileSet) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::Write(dir.to_path_buf(), e))?;

    for file in set {
        let path = dir.join(&file.path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::Write(parent.to_path_buf(), e))?;
        }

        fs::write(&path, &file.data).map_err(|e| PipelineError::Write(path.clone(), e))?;
    }

    Ok(())
}
