//! Stored-value credit tokens for Tally.
//!
//! This crate handles:
//! - Encoding credit records into opaque encrypted tokens
//! - Binding tokens to a build version
//! - First-use activation of deferred validity windows
//! - Balance checks and consumption
//! - Replay protection for retired tokens
//! - Crash-safe persistence of the current token
//!
//! # Design Principles
//!
//! - **Offline**: every check is local; there is no license server
//! - **One token, one use**: each consumption yields a new token and
//!   retires the old one
//! - **Explicit configuration**: key, version and storage come from
//!   [`EngineConfig`], not globals
//!
//! # Token Format
//!
//! `base64(nonce || ciphertext || tag)` where the plaintext is the JSON
//! object `{"version","points","start_at","end_at"}`.

mod codec;
mod config;
mod engine;
mod error;
mod issuance;
mod ledger;
mod record;
mod store;
mod version;

pub use codec::{TokenCodec, embedded_key};
pub use config::{COST_PER_COVER, COST_PER_DOWNLOAD, EngineConfig};
pub use engine::{CreditEngine, Outcome};
pub use error::{CreditError, CreditResult};
pub use issuance::{Issuer, parse_date};
pub use ledger::{LEDGER_FILE_NAME, ReplayLedger, token_digest};
pub use record::{CreditRecord, SECS_PER_DAY, UNACTIVATED_START_AT, Validity, Window};
pub use store::{KEY_FILE_NAME, KeyFileStore, LEGACY_KEY_FILE_NAME, StagedWrite, persist};
pub use version::{BASELINE_VERSION, VERSION_FILE_NAME, VersionGate};

use std::path::Path;

fn engine_for(storage_dir: Option<&Path>) -> CreditEngine {
    let config = match storage_dir {
        Some(dir) => EngineConfig::for_install_dir(dir),
        None => EngineConfig::from_executable(),
    };
    CreditEngine::new(config)
}

/// Checks `token` with the embedded key against the ledger in `storage_dir`.
///
/// Without a directory the executable's directory is used.
///
/// # Errors
///
/// See [`CreditEngine::check`].
pub fn check(token: &str, cost: i64, storage_dir: Option<&Path>) -> CreditResult<Outcome> {
    engine_for(storage_dir).check(token, cost)
}

/// Consumes `cost` from `token` with the embedded key and the ledger in
/// `storage_dir`.
///
/// Without a directory the executable's directory is used.
///
/// # Errors
///
/// See [`CreditEngine::consume`].
pub fn consume(
    token: &str,
    cost: i64,
    storage_dir: Option<&Path>,
) -> CreditResult<(String, Outcome)> {
    engine_for(storage_dir).consume(token, cost)
}

/// Issues a fixed-window token with the embedded key and current version.
///
/// # Errors
///
/// See [`Issuer::generate_fixed`].
pub fn generate_fixed(points: i64, start_date: &str, end_date: &str) -> CreditResult<String> {
    Issuer::from_config(&EngineConfig::from_executable())
        .generate_fixed(points, start_date, end_date)
}

/// Issues a deferred token with the embedded key and current version.
///
/// # Errors
///
/// See [`Issuer::generate_deferred`].
pub fn generate_deferred(points: i64, days: i64) -> CreditResult<String> {
    Issuer::from_config(&EngineConfig::from_executable()).generate_deferred(points, days)
}
