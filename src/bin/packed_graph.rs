//! Inspect a packed graph directory.
//!
//! Usage:
//!   packed-graph stats <DIR>
//!   packed-graph pip <DIR> <NAME>
//!   packed-graph file <DIR> <PATH>

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use packed_graph::{Id, PackedGraph, PipId, Table};

#[derive(Parser, Debug)]
#[command(
    name = "packed-graph",
    version,
    about = "Inspect a packed build graph directory"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print table counts
    Stats {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
    /// Print a pip with its dependencies and dependents
    Pip {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        /// Full dotted pip name
        name: String,
    },
    /// Print a file entry
    File {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        path: String,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Stats { dir } => stats(&dir),
        Command::Pip { dir, name } => pip(&dir, &name),
        Command::File { dir, path } => file(&dir, &path),
    }
}

fn open(dir: &Path) -> Result<PackedGraph> {
    PackedGraph::open(dir).with_context(|| format!("failed to load graph from {}", dir.display()))
}

fn stats(dir: &Path) -> Result<()> {
    let graph = open(dir)?;
    println!("strings:      {}", graph.strings().count());
    println!("pips:         {}", graph.pips().count());
    println!("pip names:    {}", graph.pips().names().count());
    println!("paths:        {}", graph.paths().count());
    println!("files:        {}", graph.files().count());
    println!("directories:  {}", graph.directories().count());
    println!("workers:      {}", graph.workers().count());
    match graph.relations() {
        Ok(relations) => {
            println!("dependencies: {}", relations.pip_dependencies.total_relations());
            println!("relations:    {}", relations.total_relations());
        }
        Err(_) => println!("relations:    (not constructed)"),
    }
    Ok(())
}

fn print_pips(graph: &PackedGraph, label: &str, pips: &[PipId]) -> Result<()> {
    println!("{} ({}):", label, pips.len());
    for &pip in pips {
        println!("  {}", graph.pip_name(pip)?);
    }
    Ok(())
}

fn pip(dir: &Path, name: &str) -> Result<()> {
    let graph = open(dir)?;
    let Some(id) = graph.find_pip(name) else {
        bail!("no pip named {:?}", name);
    };
    let entry = graph.pips().get(id)?;
    println!("{} {}", id, graph.pip_name(id)?);
    println!("  type: {}", entry.pip_type);
    println!("  semi-stable hash: {:016X}", entry.semi_stable_hash);
    if let Some(worker) = graph.pip_worker(id)? {
        println!("  worker: {}", graph.worker_name(worker)?);
    }

    let relations = graph
        .relations()
        .context("graph has no relation tables")?;
    print_pips(&graph, "dependencies", relations.pip_dependencies.get_relations(id)?)?;
    let dependents = relations.pip_dependencies.invert()?;
    print_pips(&graph, "dependents", dependents.get_relations(id)?)?;

    let inputs = relations.declared_input_files.get_relations(id)?;
    println!("declared input files ({}):", inputs.len());
    for &file in inputs {
        println!("  {}", graph.file_path(file)?);
    }
    Ok(())
}

fn file(dir: &Path, path: &str) -> Result<()> {
    let graph = open(dir)?;
    let Some(id) = graph.find_file(path) else {
        bail!("no file at {:?}", path);
    };
    let entry = graph.files().get(id)?;
    println!("{} {}", id, graph.file_path(id)?);
    println!("  size: {} bytes", entry.size_in_bytes);
    println!("  content: {:?}", entry.content_flags);
    if !entry.producer_pip.is_sentinel() {
        println!("  producer: {}", graph.pip_name(entry.producer_pip)?);
    }
    Ok(())
}
