//! xload - CLI entry point.
//!
//! Drives the archive reader through one of the two write strategies.
//! Input files are processed in reverse lexical order of path, and members
//! within each archive in reverse lexical order of name.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use xload::logging::LogLevel;
use xload::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogLevel::from_flags(cli.verbose, cli.quiet));

    let storage = Storage::connect(&cli.db)
        .await
        .context("failed to connect to database")?;

    match &cli.command {
        Commands::Load(args) => cmd_load(&cli, &storage, args).await,
        Commands::LoadBatch(args) => cmd_load_batch(&cli, &storage, args).await,
    }
}

/// Input paths in reverse lexical order.
fn ordered_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = inputs.to_vec();
    inputs.sort_unstable();
    inputs.reverse();
    inputs
}

async fn cmd_load(cli: &Cli, storage: &Storage, args: &LoadArgs) -> Result<()> {
    if !cli.quiet {
        println!("{}", "Loading archives (row strategy)...".bold().cyan());
    }

    for path in ordered_inputs(&args.inputs) {
        info!("loading {}", path.display());
        let mut archive = TweetArchive::open(&path)?;

        for member in archive.member_names() {
            let mut loaded = 0_usize;
            let mut present = 0_usize;

            let lines = archive.member_lines(&member)?;
            for (i, line) in lines.enumerate() {
                let line =
                    line.with_context(|| format!("failed to read line {i} of '{member}'"))?;

                let record = match normalize_line(&line, NulPolicy::Strip) {
                    Ok(record) => record,
                    Err(e) if cli.skip_malformed => {
                        warn!("{member} line {i}: skipping malformed record: {e}");
                        continue;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| format!("line {i} of '{member}'"));
                    }
                };

                let tweet_id = record.tweet.id;
                if storage.insert_record(&record).await? {
                    loaded += 1;
                } else {
                    present += 1;
                }

                if i % args.report_every == 0 {
                    info!("{member} i={} id={tweet_id}", format_number_usize(i));
                }
            }

            info!(
                "{member}: {} loaded, {} already present",
                format_number_usize(loaded),
                format_number_usize(present)
            );
        }
    }

    Ok(())
}

async fn cmd_load_batch(cli: &Cli, storage: &Storage, args: &LoadBatchArgs) -> Result<()> {
    if !cli.quiet {
        println!("{}", "Loading archives (batch strategy)...".bold().cyan());
    }

    for path in ordered_inputs(&args.inputs) {
        info!("loading {}", path.display());
        let mut archive = TweetArchive::open(&path)?;

        for member in archive.member_names() {
            let records = read_member_records(cli, &mut archive, &member)?;
            let total = records.len();

            let batches = assemble(records, args.batch_size, NulPolicy::Escape, cli.skip_malformed)?;
            let batch_count = batches.len();
            for (i, batch) in batches.iter().enumerate() {
                storage.insert_batch(batch).await?;
                info!(
                    "{member}: batch {i} done ({} records)",
                    format_number_usize(batch.record_count())
                );
            }

            info!(
                "{member}: {} records in {batch_count} batches",
                format_number_usize(total)
            );
        }
    }

    Ok(())
}

/// Parse every line of one member into a raw JSON record.
fn read_member_records(
    cli: &Cli,
    archive: &mut TweetArchive,
    member: &str,
) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for (i, line) in archive.member_lines(member)?.enumerate() {
        let line = line.with_context(|| format!("failed to read line {i} of '{member}'"))?;
        match serde_json::from_str::<Value>(&line) {
            Ok(value) => records.push(value),
            Err(e) if cli.skip_malformed => {
                warn!("{member} line {i}: skipping unparseable record: {e}");
            }
            Err(e) => {
                return Err(LoadError::malformed(e.to_string()))
                    .with_context(|| format!("line {i} of '{member}'"));
            }
        }
    }
    Ok(records)
}
