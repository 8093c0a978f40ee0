//! Key-file persistence with atomic replace.
//!
//! The live key file is `credit.txt` holding a single `encrypted=<token>`
//! line. Writes go through a process-wide lock and follow
//! backup → temp write → rename → cleanup, so a reader never observes a
//! half-written file and a crash before the rename leaves the old file
//! intact. The legacy `credit.yaml` layout is readable but never written.

use crate::error::{CreditError, CreditResult};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Live key file name.
pub const KEY_FILE_NAME: &str = "credit.txt";

/// Legacy structured key file, read-compatible only.
pub const LEGACY_KEY_FILE_NAME: &str = "credit.yaml";

/// Prefix of the token line in the key file.
const TOKEN_PREFIX: &str = "encrypted=";

/// Serializes every key-file write in the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Deserialize)]
struct LegacyKeyFile {
    #[serde(default)]
    encrypted: Option<String>,
}

/// Reads and replaces the token stored in an install directory.
#[derive(Debug, Clone)]
pub struct KeyFileStore {
    dir: PathBuf,
}

impl KeyFileStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the key file.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the live key file.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE_NAME)
    }

    /// Path of the backup sibling.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(format!("{KEY_FILE_NAME}.backup"))
    }

    /// Path of the temporary sibling.
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{KEY_FILE_NAME}.tmp"))
    }

    /// Loads the stored token, if any.
    ///
    /// Reads `credit.txt` first (an `encrypted=` line, or a bare token on
    /// the first line), then falls back to the legacy `credit.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::KeyFile`] if a key file exists but cannot be read.
    pub fn load(&self) -> CreditResult<Option<String>> {
        if let Some(content) = read_optional(&self.key_path())? {
            return Ok(parse_key_file(&content));
        }

        let legacy_path = self.dir.join(LEGACY_KEY_FILE_NAME);
        let Some(content) = read_optional(&legacy_path)? else {
            return Ok(None);
        };
        match serde_norway::from_str::<LegacyKeyFile>(&content) {
            Ok(legacy) => Ok(legacy
                .encrypted
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())),
            Err(e) => {
                warn!(
                    path = %legacy_path.display(),
                    error = %e,
                    "ignoring unparsable legacy key file"
                );
                Ok(None)
            }
        }
    }

    /// Atomically replaces the live key file with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::PersistFailed`] if the temp write or rename
    /// fails; the previous file is restored from its backup when possible.
    pub fn persist(&self, token: &str) -> CreditResult<()> {
        self.stage(token)?.commit()
    }

    /// Takes the write lock, backs up the live file and writes the temp file.
    ///
    /// Nothing visible changes until [`StagedWrite::commit`]. Dropping the
    /// staged write without committing leaves the live file untouched and
    /// removes the temp and backup siblings.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::PersistFailed`] if the temp file cannot be written.
    pub fn stage(&self, token: &str) -> CreditResult<StagedWrite<'_>> {
        let guard = WRITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

        let key_path = self.key_path();
        let backup_path = self.backup_path();
        let temp_path = self.temp_path();

        let has_backup = if key_path.exists() {
            match std::fs::copy(&key_path, &backup_path) {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "failed to back up key file");
                    false
                }
            }
        } else {
            false
        };

        if let Err(e) = std::fs::write(&temp_path, format!("{TOKEN_PREFIX}{token}\n")) {
            let _ = std::fs::remove_file(&temp_path);
            if has_backup {
                let _ = std::fs::remove_file(&backup_path);
            }
            return Err(CreditError::PersistFailed(e));
        }

        Ok(StagedWrite {
            store: self,
            has_backup,
            finished: false,
            _guard: guard,
        })
    }
}

/// A key-file write that has reached the temp file but not the rename.
///
/// Holds the process-wide write lock until dropped. Dropping it without
/// committing discards the temp file and the backup.
#[derive(Debug)]
pub struct StagedWrite<'a> {
    store: &'a KeyFileStore,
    has_backup: bool,
    finished: bool,
    _guard: MutexGuard<'static, ()>,
}

impl StagedWrite<'_> {
    /// Renames the temp file onto the live path and drops the backup.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::PersistFailed`] if the rename fails, after
    /// restoring the backup and removing the temp file.
    pub fn commit(mut self) -> CreditResult<()> {
        let key_path = self.store.key_path();
        let backup_path = self.store.backup_path();
        let temp_path = self.store.temp_path();
        self.finished = true;

        if let Err(e) = std::fs::rename(&temp_path, &key_path) {
            if self.has_backup {
                if let Err(restore) = std::fs::rename(&backup_path, &key_path) {
                    warn!(error = %restore, "failed to restore key file from backup");
                }
            }
            let _ = std::fs::remove_file(&temp_path);
            return Err(CreditError::PersistFailed(e));
        }

        if self.has_backup {
            let _ = std::fs::remove_file(&backup_path);
        }
        debug!(path = %key_path.display(), "key file replaced");
        Ok(())
    }
}

impl Drop for StagedWrite<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let _ = std::fs::remove_file(self.store.temp_path());
        if self.has_backup {
            let _ = std::fs::remove_file(self.store.backup_path());
        }
        debug!("staged key file write abandoned");
    }
}

/// Replaces the key file in `dir` with `token`.
///
/// # Errors
///
/// See [`KeyFileStore::persist`].
pub fn persist(dir: impl Into<PathBuf>, token: &str) -> CreditResult<()> {
    KeyFileStore::new(dir).persist(token)
}

fn read_optional(path: &Path) -> CreditResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CreditError::KeyFile(e)),
    }
}

fn parse_key_file(content: &str) -> Option<String> {
    let content = content.trim();
    let line = content.strip_prefix(TOKEN_PREFIX).unwrap_or(content);
    let token = line.lines().next().unwrap_or_default().trim();
    (!token.is_empty()).then(|| token.to_string())
}
