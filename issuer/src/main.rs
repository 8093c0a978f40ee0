//! Tally credit token issuer
//!
//! Mints encrypted credit tokens for distribution:
//!
//!   tally-issuer generate --points 1000 --start-date 2025.01.01 --end-date 2025.12.31
//!   tally-issuer generate-deferred --points 10 --days 7
//!   tally-issuer batch-generate --points 10 --days 7 --count 100 > keys.txt
//!   tally-issuer inspect <token>

use anyhow::Result;
use clap::Parser;
use tally_issuer::{Args, run};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    run(&args, &mut stdout.lock(), &mut stderr.lock())
}
