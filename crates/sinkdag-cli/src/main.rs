// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! `sinkdag`: operator CLI for sinkdag graph files.
//!
//! A graph file holds the raw graph wire encoding. Results are written to
//! stdout; logs go to stderr, filtered by `SINKDAG_LOG`, then the settings
//! file, then `warn`.
#![forbid(unsafe_code)]

mod commands;
mod config;

use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sinkdag::{Edge, HashAlgorithm, RandomIds, VertexId, ROOT_ID};
use tracing_subscriber::EnvFilter;

use crate::config::{Settings, LOG_ENV};

#[derive(Parser)]
#[command(
    name = "sinkdag",
    version,
    about = "Build, inspect and verify sinkdag graph files",
    disable_help_subcommand = true
)]
struct Cli {
    /// JSON settings file (`{ "hash": ..., "log": ... }`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Digest hash function: `blake3` or `sha256`. Overrides the settings file.
    #[arg(long, global = true)]
    hash: Option<HashAlgorithm>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an empty graph file.
    Init(InitArgs),
    /// Add a vertex with a generated id and print the id.
    Append(AppendArgs),
    /// Add a dependency edge `child -> parent`.
    Link(LinkArgs),
    /// List vertices, edges, frontier and root digest.
    Inspect(InspectArgs),
    /// Print a hex digest (the root unless `--id` is given).
    Digest(DigestArgs),
    /// Compare the root digest with an expected value; exits non-zero on mismatch.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Graph file to create.
    file: PathBuf,
}

#[derive(Args)]
struct AppendArgs {
    /// Graph file.
    file: PathBuf,

    /// Vertex payload.
    #[arg(long)]
    data: String,

    /// Treat `--data` as hex rather than UTF-8 text.
    #[arg(long)]
    hex: bool,

    /// Insert as a new head instead of attaching under the frontier.
    #[arg(long)]
    detached: bool,

    /// Seed for the id generator (reproducible ids).
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct LinkArgs {
    /// Graph file.
    file: PathBuf,

    /// Dependent vertex.
    #[arg(long)]
    child: VertexId,

    /// Vertex depended upon.
    #[arg(long)]
    parent: VertexId,
}

#[derive(Args)]
struct InspectArgs {
    /// Graph file.
    file: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DigestArgs {
    /// Graph file.
    file: PathBuf,

    /// Vertex to digest; 0 addresses the whole graph.
    #[arg(long, default_value_t = ROOT_ID)]
    id: VertexId,
}

#[derive(Args)]
struct VerifyArgs {
    /// Graph file.
    file: PathBuf,

    /// Expected root digest, hex.
    #[arg(long)]
    expected: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    init_tracing(&settings.log_filter(std::env::var(LOG_ENV).ok()))?;
    let hash = settings.hash_algorithm(cli.hash)?;

    let mut out = io::stdout().lock();
    run(cli.command, hash, &mut out)?;
    out.flush()?;
    Ok(())
}

fn init_tracing(filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(filter).with_context(|| format!("invalid log filter {filter:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn run(command: Commands, hash: HashAlgorithm, out: &mut impl io::Write) -> Result<()> {
    match command {
        Commands::Init(args) => commands::init(&args.file, out),
        Commands::Append(args) => {
            let payload = if args.hex {
                hex::decode(args.data.trim()).context("--data is not valid hex")?
            } else {
                args.data.into_bytes()
            };
            let mut ids = args
                .seed
                .map_or_else(RandomIds::from_entropy, RandomIds::seeded);
            commands::append(&args.file, payload, args.detached, &mut ids, out).map(|_| ())
        }
        Commands::Link(args) => {
            commands::link(&args.file, Edge::new(args.child, args.parent), out)
        }
        Commands::Inspect(args) => commands::inspect(&args.file, args.json, hash, out),
        Commands::Digest(args) => commands::digest(&args.file, args.id, &hash, out),
        Commands::Verify(args) => commands::verify(&args.file, &args.expected, &hash, out),
    }
}
