//! Engine configuration.
//!
//! Everything the engine needs is passed in explicitly: key material, the
//! version source, the install directory and the default cost. Independent
//! engines can therefore run side by side (for example in tests).

use crate::codec::embedded_key;
use crate::version::{VERSION_FILE_NAME, VersionGate};
use std::path::PathBuf;
use tally_crypto::TokenKey;
use tracing::warn;

/// Cost of one video download, and the default cost per operation.
pub const COST_PER_DOWNLOAD: i64 = 5;

/// Cost of one cover image download.
pub const COST_PER_COVER: i64 = 1;

/// Configuration for a [`crate::CreditEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Install directory holding the key file and replay ledger.
    ///
    /// When `None` the ledger is detached and the key file is unavailable.
    pub storage_dir: Option<PathBuf>,
    /// Token encryption key.
    pub key: TokenKey,
    /// Version source for the version gate.
    pub version: VersionGate,
    /// Cost applied when a caller passes zero or a negative cost.
    pub default_cost: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            key: embedded_key(),
            version: VersionGate::new(),
            default_cost: COST_PER_DOWNLOAD,
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at an install directory.
    ///
    /// The version gate also consults a `VERSION` sidecar in that directory.
    #[must_use]
    pub fn for_install_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            version: VersionGate::new().with_sidecar(dir.join(VERSION_FILE_NAME)),
            storage_dir: Some(dir),
            ..Self::default()
        }
    }

    /// Configuration rooted at the directory of the running executable.
    ///
    /// Falls back to a configuration without storage if that directory
    /// cannot be determined.
    #[must_use]
    pub fn from_executable() -> Self {
        match std::env::current_exe() {
            Ok(exe) => match exe.parent() {
                Some(dir) => Self::for_install_dir(dir),
                None => Self::default(),
            },
            Err(e) => {
                warn!(error = %e, "cannot locate executable, running without storage");
                Self::default()
            }
        }
    }

    /// Sets the token key.
    #[must_use]
    pub fn with_key(mut self, key: TokenKey) -> Self {
        self.key = key;
        self
    }

    /// Sets the version gate.
    #[must_use]
    pub fn with_version(mut self, version: VersionGate) -> Self {
        self.version = version;
        self
    }

    /// Sets the default per-operation cost.
    #[must_use]
    pub fn with_default_cost(mut self, cost: i64) -> Self {
        self.default_cost = cost;
        self
    }
}
