//! CLI definitions for xload.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// xload - bulk loader for X/Twitter archive data
#[derive(Parser, Debug)]
#[command(name = "xload")]
#[command(version)]
#[command(about = "Load zipped X/Twitter activity archives into Postgres")]
#[command(long_about = r"
xload ingests archived X/Twitter activity (one JSON record per line,
grouped into per-day files inside zip archives) into a normalized
Postgres schema, deriving point/polygon geometry from record locations.

Two loading strategies are available:

  load        one record per transaction; already-loaded records are
              skipped without touching the database again
  load-batch  grouped multi-row inserts, one transaction per batch;
              duplicates are absorbed by the uniqueness constraints

Both strategies are idempotent: re-running over overlapping archives
never duplicates a row, and independent runs may safely process the
same input concurrently.
")]
pub struct Cli {
    /// Postgres connection URL
    #[arg(long, env = "XLOAD_DB")]
    pub db: String,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip malformed records instead of aborting the run
    #[arg(long, global = true)]
    pub skip_malformed: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load archives one record per transaction
    Load(LoadArgs),

    /// Load archives with grouped multi-row inserts
    LoadBatch(LoadBatchArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Zip archives to load
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Log progress every N records
    #[arg(long, default_value = "1000")]
    pub report_every: usize,
}

#[derive(Args, Debug)]
pub struct LoadBatchArgs {
    /// Zip archives to load
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Records per grouped insert transaction
    #[arg(long, default_value = "1000")]
    pub batch_size: usize,
}
