#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod error;
pub mod exec;
pub mod fileset;
pub mod graph;
pub mod handler;
pub mod io;
pub mod pipeline;
pub mod recipe;
pub mod runner;
pub mod step;
pub mod utils;
#[cfg(feature = "live")]
mod watch;

pub use crate::config::{Config, Package, Paths, Tools};
pub use crate::error::*;
pub use crate::exec::Tool;
pub use crate::fileset::{File, FileSet};
pub use crate::graph::{Blueprint, Context, Graph};
pub use crate::handler::{Completion, Handler, plumber};
pub use crate::pipeline::{Pipeline, Stage};
pub use crate::runner::{Report, Runner, State};
pub use crate::step::Step;
