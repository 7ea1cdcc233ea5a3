use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use camino::Utf8PathBuf;
use clap::Parser;
use plumb::{Config, Runner, recipe};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Project root holding `package.json`.
    #[arg(long, default_value = ".")]
    root: Utf8PathBuf,

    /// List the available tasks and exit.
    #[arg(long)]
    list: bool,

    /// Print the task graph as a Mermaid flowchart and exit.
    #[arg(long)]
    graph: bool,

    /// Tasks to run, one after another.
    #[arg(default_value = "default")]
    tasks: Vec<String>,
}

fn run(args: Args) -> anyhow::Result<bool> {
    let graph = recipe::blueprint().finish()?;
    tracing::debug!("{} tasks declared", graph.len());

    if args.list {
        for name in graph.names() {
            println!("{name}");
        }
        return Ok(true);
    }

    if args.graph {
        print!("{graph}");
        return Ok(true);
    }

    let root = args
        .root
        .canonicalize_utf8()
        .with_context(|| format!("couldn't resolve project root {}", args.root))?;

    let config = Config::load(root)?;
    tracing::info!("{} {}", config.package.name, config.package.version);

    let runner = Runner::new(Arc::new(config));

    for task in &args.tasks {
        let report = runner.execute(&graph, task)?;
        if !report.is_success() {
            tracing::error!("`{}` failed in {}", report.entry(), report.failed().join(", "));
            return Ok(false);
        }
    }

    Ok(true)
}

fn main() -> ExitCode {
    let args = Args::parse();

    #[cfg(feature = "logging")]
    if let Err(e) = plumb::utils::init_logging() {
        eprintln!("couldn't set up logging: {e}");
    }

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
