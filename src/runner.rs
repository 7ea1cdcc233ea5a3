//! Executes tasks from a frozen [`Graph`].
//!
//! Every task reachable from the entry point starts out `Pending`. A task is
//! `Running` while its body executes and ends `Succeeded` or `Failed`:
//!
//! ```text
//! Pending -> Running -> Succeeded
//!                    -> Failed
//! ```
//!
//! A series starts each child only after the previous one succeeded; the
//! first failure fails the series and leaves the remaining children
//! `Pending`. A parallel composite starts every child on its own thread and
//! fails as soon as the first child failure is reported, but it returns only
//! once every child is done. Siblings of a failed child are never cancelled.
//!
//! Leaf bodies run inside `catch_unwind`, so a panicking task is reported as
//! a failure instead of tearing down the process.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};
use tracing::{Level, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::Config;
use crate::error::{GraphError, TaskError};
use crate::graph::{Body, Context, Graph, Task};
use crate::io::as_overhead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one [`Runner::execute`] call.
#[derive(Debug)]
pub struct Report {
    entry: String,
    states: BTreeMap<String, State>,
    durations: BTreeMap<String, Duration>,
    error: Option<TaskError>,
}

impl Report {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Last state of a task, `None` if it is not reachable from the entry.
    pub fn state(&self, name: &str) -> Option<State> {
        self.states.get(name).copied()
    }

    /// Names of every failed task, composites included.
    pub fn failed(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, state)| **state == State::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Wall time of the last run of a task.
    pub fn duration(&self, name: &str) -> Option<Duration> {
        self.durations.get(name).copied()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }
}

#[derive(Default)]
struct Entries {
    states: HashMap<NodeIndex, State>,
    durations: HashMap<NodeIndex, Duration>,
}

/// Shared bookkeeping for one execution.
struct Ledger {
    entries: Mutex<Entries>,
}

impl Ledger {
    fn new(graph: &Graph, entry: NodeIndex) -> Self {
        let mut entries = Entries::default();

        // Edges point from child to parent, walk them backwards.
        let reversed = Reversed(graph.inner());
        let mut dfs = Dfs::new(reversed, entry);
        while let Some(index) = dfs.next(reversed) {
            entries.states.insert(index, State::Pending);
        }

        Self {
            entries: Mutex::new(entries),
        }
    }

    fn set(&self, index: NodeIndex, state: State) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.states.insert(index, state);
    }

    fn finish(&self, index: NodeIndex, state: State, elapsed: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.states.insert(index, state);
        entries.durations.insert(index, elapsed);
    }

    fn into_report(self, graph: &Graph, entry: &str, error: Option<TaskError>) -> Report {
        let entries = self.entries.into_inner().unwrap_or_else(PoisonError::into_inner);

        let name = |index: NodeIndex| graph[index].name.clone();

        Report {
            entry: entry.to_string(),
            states: entries.states.into_iter().map(|(i, s)| (name(i), s)).collect(),
            durations: entries.durations.into_iter().map(|(i, d)| (name(i), d)).collect(),
            error,
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown payload")
    }
}

pub struct Runner {
    config: Arc<Config>,
}

impl Runner {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the task named `entry` and everything it is composed of.
    ///
    /// Only an unknown task name is an error here; task failures are part of
    /// the returned [`Report`].
    pub fn execute(&self, graph: &Graph, entry: &str) -> Result<Report, GraphError> {
        let index = graph
            .lookup(entry)
            .ok_or_else(|| GraphError::Unknown(entry.to_string()))?;

        let ledger = Ledger::new(graph, index);

        let root_span = tracing::span!(Level::INFO, "run");
        if let Ok(style) = crate::utils::get_style_task() {
            root_span.pb_set_style(&style);
        }
        root_span.pb_set_message(entry);
        let _enter = root_span.enter();

        let start = Instant::now();
        let result = self.run(graph, index, &ledger);

        match &result {
            Ok(()) => tracing::info!("finished `{entry}` {}", as_overhead(start)),
            Err(err) => tracing::error!("`{entry}` failed {}\n{err}", as_overhead(start)),
        }

        Ok(ledger.into_report(graph, entry, result.err()))
    }

    fn run(&self, graph: &Graph, index: NodeIndex, ledger: &Ledger) -> Result<(), TaskError> {
        let task = &graph[index];
        ledger.set(index, State::Running);

        let start = Instant::now();
        let result = match &task.body {
            Body::Pipeline(factory) => self.run_leaf(task, |cx| {
                let pipeline = factory(cx).map_err(|source| TaskError::Action {
                    task: task.name.clone(),
                    source,
                })?;
                pipeline
                    .run(&self.config.root)
                    .map(drop)
                    .map_err(|source| TaskError::Pipeline {
                        task: task.name.clone(),
                        source,
                    })
            }),
            Body::Action(action) => self.run_leaf(task, |cx| {
                action(cx).map_err(|source| TaskError::Action {
                    task: task.name.clone(),
                    source,
                })
            }),
            Body::Series(children) => self.run_series(graph, task, children, ledger),
            Body::Parallel(children) => self.run_parallel(graph, index, children, ledger),
            Body::Watch { patterns, target } => self.run_watch(graph, task, patterns, *target),
        };

        let state = match result {
            Ok(()) => State::Succeeded,
            Err(_) => State::Failed,
        };
        ledger.finish(index, state, start.elapsed());

        result
    }

    fn run_leaf<F>(&self, task: &Task, body: F) -> Result<(), TaskError>
    where
        F: FnOnce(&Context) -> Result<(), TaskError>,
    {
        let span = tracing::span!(Level::INFO, "task", name = %task.name);
        if let Ok(style) = crate::utils::get_style_task() {
            span.pb_set_style(&style);
        }
        span.pb_set_message(&task.name);
        let _enter = span.enter();

        tracing::info!("starting `{}`", task.name);
        let start = Instant::now();

        let cx = Context {
            config: &self.config,
            task: &task.name,
        };

        // Task bodies only see shared, read-only state, so a panic cannot
        // leave anything half-updated for the rest of the run.
        let result = match panic::catch_unwind(AssertUnwindSafe(|| body(&cx))) {
            Ok(result) => result,
            Err(panic) => Err(TaskError::Panic {
                task: task.name.clone(),
                message: panic_message(panic),
            }),
        };

        match &result {
            Ok(()) => tracing::info!("finished `{}` {}", task.name, as_overhead(start)),
            Err(err) => tracing::error!("`{}` failed {}\n{err}", task.name, as_overhead(start)),
        }

        result
    }

    fn run_series(
        &self,
        graph: &Graph,
        task: &Task,
        children: &[NodeIndex],
        ledger: &Ledger,
    ) -> Result<(), TaskError> {
        for &child in children {
            self.run(graph, child, ledger).map_err(|source| TaskError::Composition {
                task: task.name.clone(),
                child: graph[child].name.clone(),
                source: Box::new(source),
            })?;
        }

        Ok(())
    }

    fn run_parallel(
        &self,
        graph: &Graph,
        index: NodeIndex,
        children: &[NodeIndex],
        ledger: &Ledger,
    ) -> Result<(), TaskError> {
        let task = &graph[index];
        let mut failure = None;

        thread::scope(|s| {
            let (tx, rx) = channel();

            for &child in children {
                let tx = tx.clone();
                let parent = Span::current();

                s.spawn(move || {
                    let _enter = parent.enter();
                    let result = self.run(graph, child, ledger);
                    // The receiver outlives every sender inside this scope.
                    let _ = tx.send((child, result));
                });
            }

            drop(tx);

            for (child, result) in rx {
                let Err(source) = result else {
                    continue;
                };

                if failure.is_none() {
                    ledger.set(index, State::Failed);
                    failure = Some(TaskError::Composition {
                        task: task.name.clone(),
                        child: graph[child].name.clone(),
                        source: Box::new(source),
                    });
                } else {
                    tracing::warn!(
                        "`{}` failed as well while `{}` was finishing",
                        graph[child].name,
                        task.name
                    );
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[cfg(feature = "live")]
    fn run_watch(
        &self,
        graph: &Graph,
        task: &Task,
        patterns: &[String],
        target: NodeIndex,
    ) -> Result<(), TaskError> {
        crate::watch::watch(self, graph, patterns, target).map_err(|source| TaskError::Action {
            task: task.name.clone(),
            source: source.into(),
        })
    }

    #[cfg(not(feature = "live"))]
    fn run_watch(
        &self,
        _graph: &Graph,
        task: &Task,
        _patterns: &[String],
        _target: NodeIndex,
    ) -> Result<(), TaskError> {
        Err(TaskError::Action {
            task: task.name.clone(),
            source: anyhow::anyhow!("watching requires the `live` feature"),
        })
    }
}
