//! Command-line surface for minting Tally credit tokens.
//!
//! Tokens are written to stdout (one per line for batches) so output can be
//! redirected straight into a key list; summaries go to stderr.

use anyhow::{Context, Result, bail};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tally_credit::{CreditRecord, Issuer, TokenCodec, VersionGate, embedded_key};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tally-issuer")]
#[command(about = "Mint encrypted credit tokens")]
pub struct Args {
    /// Version tag to stamp into tokens (overrides every other source)
    #[arg(long, global = true)]
    pub version_tag: Option<String>,

    /// Sidecar file holding the version tag
    #[arg(long, global = true)]
    pub version_file: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Token valid between two calendar dates
    Generate {
        /// Credit points
        #[arg(long, default_value = "1000")]
        points: i64,
        /// First valid day (YYYY.MM.DD, YYYY-MM-DD, YYYY/MM/DD or YYYYMMDD)
        #[arg(long)]
        start_date: String,
        /// Last valid day, inclusive
        #[arg(long)]
        end_date: String,
    },
    /// Token valid for a number of days from first use
    GenerateDeferred {
        /// Credit points
        #[arg(long, default_value = "10")]
        points: i64,
        /// Validity in days, counted from first use
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// Many deferred tokens, one per line
    BatchGenerate {
        /// Credit points per token
        #[arg(long, default_value = "10")]
        points: i64,
        /// Validity in days per token, counted from first use
        #[arg(long, default_value = "7")]
        days: i64,
        /// Number of tokens
        #[arg(long, default_value = "100")]
        count: usize,
    },
    /// Decode a token and print its record
    Inspect {
        /// The token to decode
        token: String,
    },
}

impl Args {
    /// Builds the version gate selected by the command line.
    pub fn version_gate(&self) -> VersionGate {
        let mut gate = VersionGate::new();
        if let Some(path) = &self.version_file {
            gate = gate.with_sidecar(path);
        }
        if let Some(tag) = &self.version_tag {
            gate = gate.with_override(tag);
        }
        gate
    }
}

/// Runs one command, writing tokens to `out` and summaries to `diag`.
pub fn run(args: &Args, out: &mut impl Write, diag: &mut impl Write) -> Result<()> {
    let issuer = Issuer::new(TokenCodec::new(embedded_key()), args.version_gate());

    match &args.command {
        Command::Generate {
            points,
            start_date,
            end_date,
        } => {
            ensure_positive("points", *points)?;
            let token = issuer
                .generate_fixed(*points, start_date, end_date)
                .context("failed to generate token")?;
            writeln!(out, "encrypted={token}")?;
            writeln!(diag, "version:  {}", issuer.version())?;
            writeln!(diag, "points:   {points}")?;
            writeln!(diag, "valid:    {start_date} 00:00:00 .. {end_date} 23:59:59")?;
            info!(points, "issued fixed-window token");
        }
        Command::GenerateDeferred { points, days } => {
            ensure_positive("points", *points)?;
            ensure_positive("days", *days)?;
            let token = issuer
                .generate_deferred(*points, *days)
                .context("failed to generate token")?;
            writeln!(out, "encrypted={token}")?;
            writeln!(diag, "version:  {}", issuer.version())?;
            writeln!(diag, "points:   {points}")?;
            writeln!(diag, "valid:    {days} days from first use")?;
            info!(points, days, "issued deferred token");
        }
        Command::BatchGenerate {
            points,
            days,
            count,
        } => {
            ensure_positive("points", *points)?;
            ensure_positive("days", *days)?;
            if *count == 0 {
                bail!("count must be greater than 0");
            }
            let tokens = issuer
                .generate_batch(*points, *days, *count)
                .context("failed to generate batch")?;
            for token in &tokens {
                writeln!(out, "{token}")?;
            }
            writeln!(
                diag,
                "generated {} tokens: version {}, {points} points, {days} days from first use",
                tokens.len(),
                issuer.version()
            )?;
            info!(count, points, days, "issued token batch");
        }
        Command::Inspect { token } => {
            let codec = TokenCodec::new(embedded_key());
            let record = codec.decode(token.trim()).context("failed to decode token")?;
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
            describe(&record, diag)?;
        }
    }
    Ok(())
}

fn ensure_positive(name: &str, value: i64) -> Result<()> {
    if value <= 0 {
        bail!("{name} must be greater than 0, got {value}");
    }
    Ok(())
}

fn describe(record: &CreditRecord, diag: &mut impl Write) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    if now < record.start_at {
        writeln!(
            diag,
            "not activated; valid {} days from first use",
            record.duration_secs() / tally_credit::SECS_PER_DAY
        )?;
    } else {
        writeln!(
            diag,
            "valid {} .. {}",
            format_local(record.start_at),
            format_local(record.end_at)
        )?;
    }
    Ok(())
}

fn format_local(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
