//! The task graph.
//!
//! Tasks are declared by name on a [`Blueprint`] and frozen into an
//! immutable [`Graph`] by [`Blueprint::finish`]. A task is either a leaf,
//! which does actual work, or a composite, which only orders other tasks:
//!
//! * **Pipeline**: a factory that builds a fresh [`Pipeline`] for every run.
//! * **Action**: a callback for leaf work that is not a file pipeline, such
//!   as deleting a directory or running git.
//! * **Series**: runs its children one after another, stopping at the first
//!   failure.
//! * **Parallel**: runs its children concurrently and waits for all of them.
//! * **Watch**: re-runs a target task whenever files matching its patterns
//!   change.
//!
//! ## Validation
//!
//! Composites refer to their children by name, so a blueprint can be written
//! in any order. [`Blueprint::finish`] resolves every name and rejects
//! duplicate names, references to undefined tasks and cycles. Once frozen,
//! a graph is never modified and can be shared freely between threads.
//!
//! Under the hood the graph is a `petgraph` graph whose edges point from a
//! child to the composite that uses it, the same direction data flows in.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::Index;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::config::Config;
use crate::error::GraphError;
use crate::pipeline::Pipeline;

/// What a leaf task gets to see while it runs.
pub struct Context<'a> {
    pub config: &'a Config,
    /// Name of the running task.
    pub task: &'a str,
}

pub type PipelineFn = Arc<dyn Fn(&Context) -> anyhow::Result<Pipeline> + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(&Context) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum Body {
    Pipeline(PipelineFn),
    Action(ActionFn),
    Series(Vec<NodeIndex>),
    Parallel(Vec<NodeIndex>),
    Watch {
        patterns: Vec<String>,
        target: NodeIndex,
    },
}

#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub body: Body,
}

impl Task {
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, Body::Pipeline(_) | Body::Action(_))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            Body::Pipeline(_) => "pipeline",
            Body::Action(_) => "action",
            Body::Series(_) => "series",
            Body::Parallel(_) => "parallel",
            Body::Watch { .. } => "watch",
        };

        f.debug_struct("Task")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// How a child relates to the composite that refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Position within a series, starting at 1.
    Series(usize),
    Parallel,
    Watch,
}

enum Plan {
    Pipeline(PipelineFn),
    Action(ActionFn),
    Series(Vec<String>),
    Parallel(Vec<String>),
    Watch {
        patterns: Vec<String>,
        target: String,
    },
}

impl Plan {
    fn references(&self) -> Vec<&str> {
        match self {
            Plan::Pipeline(_) | Plan::Action(_) => Vec::new(),
            Plan::Series(children) | Plan::Parallel(children) => {
                children.iter().map(String::as_str).collect()
            }
            Plan::Watch { target, .. } => vec![target.as_str()],
        }
    }
}

fn names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}

/// Collects task declarations before they are validated.
#[derive(Default)]
pub struct Blueprint {
    plans: Vec<(String, Plan)>,
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a task that builds and runs a pipeline.
    pub fn pipeline<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Context) -> anyhow::Result<Pipeline> + Send + Sync + 'static,
    {
        self.plans.push((name.into(), Plan::Pipeline(Arc::new(factory))));
        self
    }

    pub fn action<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: Fn(&Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plans.push((name.into(), Plan::Action(Arc::new(action))));
        self
    }

    pub fn series<I, S>(&mut self, name: impl Into<String>, children: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plans.push((name.into(), Plan::Series(names(children))));
        self
    }

    pub fn parallel<I, S>(&mut self, name: impl Into<String>, children: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plans.push((name.into(), Plan::Parallel(names(children))));
        self
    }

    /// Declares a task that re-runs `target` whenever a file matching one of
    /// `patterns` changes. Patterns are relative to the project root.
    pub fn watch<I, S>(&mut self, name: impl Into<String>, patterns: I, target: impl Into<String>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let plan = Plan::Watch {
            patterns: names(patterns),
            target: target.into(),
        };
        self.plans.push((name.into(), plan));
        self
    }

    /// Resolves every reference and freezes the graph.
    pub fn finish(self) -> Result<Graph, GraphError> {
        let mut graph = DiGraph::with_capacity(self.plans.len(), self.plans.len());
        let mut lookup = HashMap::with_capacity(self.plans.len());

        // Nodes are created first so composites can refer to tasks declared
        // after them. The body is filled in once every name is known.
        for (name, _) in &self.plans {
            if lookup.contains_key(name) {
                return Err(GraphError::Duplicate(name.clone()));
            }
            let index = graph.add_node(Task {
                name: name.clone(),
                body: Body::Series(Vec::new()),
            });
            lookup.insert(name.clone(), index);
        }

        for (name, plan) in self.plans {
            let parent = lookup[&name];

            let mut resolved = Vec::new();
            for child in plan.references() {
                let index = lookup.get(child).ok_or_else(|| GraphError::Missing {
                    parent: name.clone(),
                    child: child.to_string(),
                })?;
                resolved.push(*index);
            }

            let body = match plan {
                Plan::Pipeline(factory) => Body::Pipeline(factory),
                Plan::Action(action) => Body::Action(action),
                Plan::Series(_) => {
                    for (i, &child) in resolved.iter().enumerate() {
                        graph.add_edge(child, parent, Link::Series(i + 1));
                    }
                    Body::Series(resolved)
                }
                Plan::Parallel(_) => {
                    for &child in &resolved {
                        graph.add_edge(child, parent, Link::Parallel);
                    }
                    Body::Parallel(resolved)
                }
                Plan::Watch { patterns, .. } => {
                    let target = resolved[0];
                    graph.add_edge(target, parent, Link::Watch);
                    Body::Watch { patterns, target }
                }
            };

            graph[parent].body = body;
        }

        toposort(&graph, None).map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].name.clone()))?;

        Ok(Graph { graph, lookup })
    }
}

/// A validated, immutable task graph.
pub struct Graph {
    graph: DiGraph<Task, Link>,
    lookup: HashMap<String, NodeIndex>,
}

impl Graph {
    pub fn lookup(&self, name: &str) -> Option<NodeIndex> {
        self.lookup.get(name).copied()
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.lookup(name).map(|index| &self.graph[index])
    }

    /// Task names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.lookup.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub(crate) fn inner(&self) -> &DiGraph<Task, Link> {
        &self.graph
    }
}

impl Index<NodeIndex> for Graph {
    type Output = Task;

    fn index(&self, index: NodeIndex) -> &Task {
        &self.graph[index]
    }
}

/// Renders the graph as a Mermaid flowchart.
impl Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let task = &self.graph[index];
            let name = task.name.replace('"', "\\\"");
            if task.is_leaf() {
                writeln!(f, "    n{}[\"{}\"]", index.index(), name)?;
            } else {
                writeln!(f, "    n{}([\"{}\"])", index.index(), name)?;
            }
        }

        for edge in self.graph.edge_references() {
            let (source, target) = (edge.source().index(), edge.target().index());
            match edge.weight() {
                Link::Series(i) => writeln!(f, "    n{source} -->|{i}| n{target}")?,
                Link::Parallel => writeln!(f, "    n{source} --> n{target}")?,
                Link::Watch => writeln!(f, "    n{source} -.->|watch| n{target}")?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_forward_references() {
        let mut bp = Blueprint::new();
        bp.series("build", ["clean", "compile"]);
        bp.action("clean", noop);
        bp.action("compile", noop);

        let graph = bp.finish().unwrap();
        assert_eq!(graph.len(), 3);
        assert!(!graph.is_empty());
        assert_eq!(graph.names(), vec!["build", "clean", "compile"]);

        let build = graph.task("build").unwrap();
        let Body::Series(children) = &build.body else {
            panic!("expected a series, got {build:?}");
        };
        let children: Vec<_> = children.iter().map(|&i| graph[i].name.as_str()).collect();
        assert_eq!(children, vec!["clean", "compile"]);
    }

    #[test]
    fn test_duplicate() {
        let mut bp = Blueprint::new();
        bp.action("clean", noop);
        bp.action("clean", noop);

        assert!(matches!(bp.finish(), Err(GraphError::Duplicate(name)) if name == "clean"));
    }

    #[test]
    fn test_missing_child() {
        let mut bp = Blueprint::new();
        bp.series("build", ["clean", "compile"]);
        bp.action("clean", noop);

        let err = bp.finish().err().unwrap();
        assert!(matches!(
            err,
            GraphError::Missing { ref parent, ref child } if parent == "build" && child == "compile"
        ));
    }

    #[test]
    fn test_missing_watch_target() {
        let mut bp = Blueprint::new();
        bp.watch("watch:src", ["src/**/*.js"], "build");

        assert!(matches!(bp.finish(), Err(GraphError::Missing { .. })));
    }

    #[test]
    fn test_cycle() {
        let mut bp = Blueprint::new();
        bp.series("a", ["b"]);
        bp.parallel("b", ["c"]);
        bp.series("c", ["a"]);

        assert!(matches!(bp.finish(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn test_self_reference() {
        let mut bp = Blueprint::new();
        bp.series("a", ["a"]);

        assert!(matches!(bp.finish(), Err(GraphError::Cycle(name)) if name == "a"));
    }

    #[test]
    fn test_shared_child_is_not_a_cycle() {
        let mut bp = Blueprint::new();
        bp.action("clean", noop);
        bp.series("scripts", ["clean"]);
        bp.series("styles", ["clean"]);
        bp.parallel("all", ["scripts", "styles"]);

        assert!(bp.finish().is_ok());
    }

    #[test]
    fn test_mermaid() {
        let mut bp = Blueprint::new();
        bp.action("clean", noop);
        bp.action("compile", noop);
        bp.series("build", ["clean", "compile"]);
        bp.watch("watch", ["src/*.js"], "build");

        let graph = bp.finish().unwrap();
        let mermaid = graph.to_string();

        assert!(mermaid.starts_with("graph LR\n"));
        assert!(mermaid.contains("n0[\"clean\"]"));
        assert!(mermaid.contains("n2([\"build\"])"));
        assert!(mermaid.contains("n0 -->|1| n2"));
        assert!(mermaid.contains("n1 -->|2| n2"));
        assert!(mermaid.contains("n2 -.->|watch| n3"));
    }
}
