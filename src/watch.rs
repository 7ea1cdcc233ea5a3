//! Watch mode.
//!
//! A watch task monitors the static roots of its glob patterns with
//! `notify`, debounced by 250ms, and re-runs its target task whenever a
//! matching file is created, modified or removed.
//!
//! ## The loop
//!
//! Rebuilds never overlap. The debouncer thread only forwards changed paths
//! over a channel; the watch loop picks them up one batch at a time and
//! runs the target to completion before looking at the channel again. Every
//! batch that arrived in the meantime is drained and coalesced into at most
//! one follow-up rebuild, so a burst of saves during a long build costs one
//! extra build, not one per save.
//!
//! A failing rebuild is logged and the loop keeps listening. The loop ends
//! when the watcher goes away and the channel closes. A watch task none of
//! whose patterns resolve to an existing path fails right away.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use petgraph::graph::NodeIndex;

use crate::error::WatchError;
use crate::graph::Graph;
use crate::pipeline::split_glob;
use crate::runner::Runner;

/// Watches `patterns` and re-runs `target` on every change. Blocks until the
/// watcher shuts down.
pub fn watch(
    runner: &Runner,
    graph: &Graph,
    patterns: &[String],
    target: NodeIndex,
) -> Result<(), WatchError> {
    let root = &runner.config().root;

    let mut watched = HashSet::new();
    let mut filters = Vec::new();
    for pattern in patterns.iter().flat_map(|pattern| expand_braces(pattern)) {
        match resolve_watch_path(root, &pattern) {
            Ok((path, filter)) => {
                watched.insert(path);
                filters.push(filter);
            }
            Err(e) => tracing::error!("failed to resolve path {pattern}: {e}"),
        }
    }

    if watched.is_empty() {
        return Err(WatchError::Unresolved(patterns.to_vec()));
    }

    let (tx, rx) = channel();
    let mut debouncer = new_debouncer(
        Duration::from_millis(250),
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|de| {
                        matches!(
                            de.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        )
                    })
                    .flat_map(|de| de.event.paths)
                    .collect();

                if !paths.is_empty() {
                    // The loop is gone once the receiver is dropped.
                    let _ = tx.send(paths);
                }
            }
            Err(errors) => {
                for e in errors {
                    tracing::error!("watch error: {e:?}");
                }
            }
        },
    )?;

    // Collapse watched paths to reduce the number of watches
    for path in collapse_watch_paths(watched) {
        tracing::info!("watching {path}");
        debouncer.watch(&path, RecursiveMode::Recursive)?;
    }

    let name = graph[target].name.as_str();
    tracing::info!("waiting for changes, `{name}` will re-run on every change...");

    serve(&rx, &filters, || {
        tracing::info!("change detected, re-running `{name}`...");
        match runner.execute(graph, name) {
            Ok(report) if report.is_success() => {
                tracing::info!("rebuild complete, watching for changes...");
            }
            Ok(_) => tracing::warn!("rebuild failed, watching for changes..."),
            Err(e) => tracing::error!("{e}"),
        }
    });

    Ok(())
}

fn is_relevant(paths: &[PathBuf], filters: &[Pattern]) -> bool {
    paths
        .iter()
        .any(|path| filters.iter().any(|filter| filter.matches_path(path)))
}

/// Runs `rebuild` for every batch of changed paths matching `filters`, one
/// rebuild at a time. Batches received while a rebuild is running are
/// coalesced into a single follow-up run. Returns the number of rebuilds
/// once the channel closes.
pub(crate) fn serve<F>(rx: &Receiver<Vec<PathBuf>>, filters: &[Pattern], mut rebuild: F) -> usize
where
    F: FnMut(),
{
    let mut runs = 0;

    while let Ok(paths) = rx.recv() {
        if !is_relevant(&paths, filters) {
            continue;
        }

        loop {
            rebuild();
            runs += 1;

            let queued = rx
                .try_iter()
                .fold(false, |queued, paths| queued || is_relevant(&paths, filters));

            if !queued {
                break;
            }
        }
    }

    runs
}

/// Expands `{a,b}` alternations, which `glob` does not understand.
///
/// `src/**/*.{js,html}` becomes `src/**/*.js` and `src/**/*.html`.
pub(crate) fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| open + i) else {
        return vec![pattern.to_string()];
    };

    let head = &pattern[..open];
    let tail = &pattern[close + 1..];

    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}

/// Splits a glob relative to `root` into a canonicalized static path (for
/// watching) and a compiled absolute pattern (for matching).
pub fn resolve_watch_path(root: &Utf8Path, glob: &str) -> Result<(Utf8PathBuf, Pattern), WatchError> {
    let (root_part, suffix_part) = split_glob(glob);

    // The static part must exist on disk
    let absolute_root = root.join(root_part).canonicalize_utf8()?;

    // A concrete file is matched exactly but its parent is watched, so that
    // editors replacing the file on save are caught as well.
    if suffix_part.as_str().is_empty() && absolute_root.is_file() {
        let parent = absolute_root
            .parent()
            .unwrap_or(&absolute_root)
            .to_path_buf();
        let pattern = Pattern::new(&Pattern::escape(absolute_root.as_str()))?;
        return Ok((parent, pattern));
    }

    let pattern = if suffix_part.as_str().is_empty() {
        Pattern::escape(absolute_root.as_str())
    } else {
        format!("{}/{}", Pattern::escape(absolute_root.as_str()), suffix_part)
    };

    Ok((absolute_root, Pattern::new(&pattern)?))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because
/// the watcher is recursive. This function sorts the paths and filters
/// out any path that is a subdirectory of a previously accepted path.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
