//! Replay ledger of retired token strings.
//!
//! The ledger is a flat text file (`.use`) in the install directory holding
//! one lowercase-hex SHA-256 digest per line. Only digests are stored, never
//! token content. A recorded digest rejects that exact token string forever.

use crate::error::{CreditError, CreditResult};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// File name of the ledger inside the install directory.
pub const LEDGER_FILE_NAME: &str = ".use";

/// Returns the lowercase-hex SHA-256 digest of a token string.
#[must_use]
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Append-only record of tokens that may not be used again.
#[derive(Debug, Default)]
pub struct ReplayLedger {
    dir: Option<PathBuf>,
    append_lock: Mutex<()>,
}

impl ReplayLedger {
    /// Creates a ledger stored in `dir`, or a detached one when `None`.
    ///
    /// A detached ledger never records and reports nothing as recorded.
    #[must_use]
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            append_lock: Mutex::new(()),
        }
    }

    /// Path of the ledger file, if a directory is configured.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_deref().map(|d| d.join(LEDGER_FILE_NAME))
    }

    /// Returns true if the token's digest is in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::LedgerIo`] if the ledger exists but cannot be read.
    pub fn is_recorded(&self, token: &str) -> CreditResult<bool> {
        let Some(path) = self.path() else {
            return Ok(false);
        };
        if token.is_empty() {
            return Ok(false);
        }
        contains_digest(&path, &token_digest(token))
    }

    /// Adds the token's digest to the ledger. Recording twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::LedgerIo`] if the ledger cannot be read or
    /// appended.
    pub fn record(&self, token: &str) -> CreditResult<()> {
        let Some(path) = self.path() else {
            debug!("no ledger directory, skipping retirement");
            return Ok(());
        };
        if token.is_empty() {
            return Ok(());
        }

        let digest = token_digest(token);
        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if contains_digest(&path, &digest)? {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(CreditError::LedgerIo)?;
        file.write_all(format!("{digest}\n").as_bytes())
            .map_err(CreditError::LedgerIo)?;

        debug!(digest = &digest[..12], "token retired");
        Ok(())
    }

    /// Records the token, logging instead of failing.
    ///
    /// Used on paths that are already rejecting the request, where a ledger
    /// failure must not replace the primary error.
    pub(crate) fn retire_quietly(&self, token: &str) {
        if let Err(e) = self.record(token) {
            warn!(error = %e, "failed to retire token");
        }
    }
}

fn contains_digest(path: &Path, digest: &str) -> CreditResult<bool> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().any(|line| line.trim() == digest)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CreditError::LedgerIo(e)),
    }
}
