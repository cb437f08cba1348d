//! Quarry CLI
//!
//! Front door for the analyzer:
//! - `run` evaluates a batch of queries against a SIMPLE source file
//! - `repl` opens an interactive query shell
//! - `dump` prints populated relations and entity tables

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use quarry_qps::Session;

mod dump;
mod repl;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(
    author,
    version,
    about = "Quarry: knowledge base and query engine for SIMPLE programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a batch of queries against a SIMPLE source file.
    ///
    /// The query file holds one query per line; blank lines and lines
    /// starting with `#` are skipped.
    Run {
        /// SIMPLE source file
        source: PathBuf,
        /// Query file, one query per line
        #[arg(short, long)]
        queries: PathBuf,
        /// Emit a JSON document instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Open an interactive query shell over a SIMPLE source file.
    Repl {
        /// SIMPLE source file
        source: PathBuf,
    },

    /// Print populated relations (debugging aid).
    Dump {
        /// SIMPLE source file
        source: PathBuf,
        /// Restrict output to one relation: follows, parent, calls, next,
        /// affects, modifies, uses, entities
        #[arg(long)]
        relation: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            source,
            queries,
            json,
        } => cmd_run(&source, &queries, json),
        Commands::Repl { source } => repl::cmd_repl(&source),
        Commands::Dump { source, relation } => dump::cmd_dump(&source, relation.as_deref()),
    }
}

fn cmd_run(source: &Path, queries: &Path, json: bool) -> Result<()> {
    let session = Session::from_file(source)?;
    let text =
        fs::read_to_string(queries).with_context(|| format!("reading {}", queries.display()))?;

    let mut evaluated: Vec<(String, Vec<String>)> = Vec::new();
    for line in text.lines() {
        let query = line.trim();
        if query.is_empty() || query.starts_with('#') {
            continue;
        }
        evaluated.push((query.to_string(), session.evaluate(query)));
    }

    if json {
        let doc: Vec<serde_json::Value> = evaluated
            .iter()
            .map(|(query, results)| serde_json::json!({ "query": query, "results": results }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        for (_, results) in &evaluated {
            if results.is_empty() {
                println!("none");
            } else {
                println!("{}", results.join(", "));
            }
        }
    }

    Ok(())
}
