//! Credit validation and consumption.
//!
//! `check` previews whether a token can pay for an operation; `consume`
//! commits activation, deducts the cost and returns the replacement token.
//! Every successful consumption retires the input token string, so callers
//! must adopt the returned token. `redeem` runs load → consume → persist
//! against the key file as one critical section.

use crate::codec::TokenCodec;
use crate::config::EngineConfig;
use crate::error::{CreditError, CreditResult};
use crate::ledger::ReplayLedger;
use crate::record::{CreditRecord, Window};
use crate::store::KeyFileStore;
use crate::version::VersionGate;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Result of a successful check or consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// The record after the operation (unchanged for a check).
    pub record: CreditRecord,
    /// The window in force (previewed for an unactivated check).
    pub window: Window,
    /// Seconds until the window closes.
    pub expires_in: i64,
}

impl Outcome {
    fn new(record: CreditRecord, window: Window, now: i64) -> Self {
        Self {
            record,
            window,
            expires_in: window.expires_in(now),
        }
    }
}

/// Validates and consumes credit tokens for one installation.
#[derive(Debug)]
pub struct CreditEngine {
    codec: TokenCodec,
    version: VersionGate,
    ledger: ReplayLedger,
    store: Option<KeyFileStore>,
    default_cost: i64,
    redeem_lock: Mutex<()>,
}

impl CreditEngine {
    /// Creates an engine from its configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let EngineConfig {
            storage_dir,
            key,
            version,
            default_cost,
        } = config;

        Self {
            codec: TokenCodec::new(key),
            version,
            ledger: ReplayLedger::new(storage_dir.clone()),
            store: storage_dir.map(KeyFileStore::new),
            default_cost,
            redeem_lock: Mutex::new(()),
        }
    }

    /// The codec used by this engine.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// The replay ledger used by this engine.
    #[must_use]
    pub fn ledger(&self) -> &ReplayLedger {
        &self.ledger
    }

    /// The key-file store, if a storage directory is configured.
    #[must_use]
    pub fn store(&self) -> Option<&KeyFileStore> {
        self.store.as_ref()
    }

    /// The version tokens must carry to validate.
    pub fn current_version(&self) -> &str {
        self.version.current_version()
    }

    /// Checks whether `token` can pay `cost` right now.
    ///
    /// # Errors
    ///
    /// Returns the token's rejection reason; see [`CreditError`].
    pub fn check(&self, token: &str, cost: i64) -> CreditResult<Outcome> {
        self.check_at(token, cost, now())
    }

    /// Checks whether `token` can pay `cost` at time `now`.
    ///
    /// An unactivated token is judged against the window it would get if
    /// activated at `now`; the token itself is not changed. Expired and
    /// exhausted tokens are retired into the ledger.
    ///
    /// # Errors
    ///
    /// Returns the token's rejection reason; see [`CreditError`].
    pub fn check_at(&self, token: &str, cost: i64, now: i64) -> CreditResult<Outcome> {
        let cost = self.resolve_cost(cost);
        let record = self.admit(token)?;
        let window = record.effective_window(now);
        self.enforce(token, &record, window, cost, now)?;

        debug!(points = record.points, cost, "credit check passed");
        Ok(Outcome::new(record, window, now))
    }

    /// Consumes `cost` from `token` and returns the replacement token.
    ///
    /// # Errors
    ///
    /// Returns the token's rejection reason; see [`CreditError`].
    pub fn consume(&self, token: &str, cost: i64) -> CreditResult<(String, Outcome)> {
        self.consume_at(token, cost, now())
    }

    /// Consumes `cost` from `token` at time `now`.
    ///
    /// Activates an unactivated record, deducts the cost, re-encodes the
    /// record and retires the input token regardless of the remaining
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns the token's rejection reason; see [`CreditError`]. On
    /// [`CreditError::EncodingFailed`] or [`CreditError::LedgerIo`] nothing
    /// has been retired and the input token stays usable.
    pub fn consume_at(&self, token: &str, cost: i64, now: i64) -> CreditResult<(String, Outcome)> {
        let (next_token, outcome) = self.debit(token, cost, now)?;
        self.ledger.record(token)?;
        Ok((next_token, outcome))
    }

    /// Consumes `cost` from the token in the key file and persists the result.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::MissingStorageDir`] without a storage
    /// directory, [`CreditError::NoToken`] if the key file holds no token,
    /// or any consumption or persistence error.
    pub fn redeem(&self, cost: i64) -> CreditResult<(String, Outcome)> {
        self.redeem_at(cost, now())
    }

    /// Consumes `cost` from the stored token at time `now`.
    ///
    /// Loading, validation, ledger update and the key-file replace all
    /// happen under one lock, so concurrent redemptions in this process
    /// cannot both spend the same stored token. The replacement is staged
    /// before the old token is retired; if retirement fails the key file is
    /// left as it was. If the final rename fails after retirement, the
    /// replacement is handed back in [`CreditError::ReplacementUnsaved`].
    ///
    /// # Errors
    ///
    /// See [`CreditEngine::redeem`].
    pub fn redeem_at(&self, cost: i64, now: i64) -> CreditResult<(String, Outcome)> {
        let store = self.store.as_ref().ok_or(CreditError::MissingStorageDir)?;
        let _guard = self
            .redeem_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let token = store
            .load()?
            .ok_or_else(|| CreditError::NoToken(store.key_path()))?;
        let (next_token, outcome) = self.debit(&token, cost, now)?;

        let staged = store.stage(&next_token)?;
        self.ledger.record(&token)?;
        if let Err(e) = staged.commit() {
            return Err(unsaved(next_token, e));
        }

        info!(
            points = outcome.record.points,
            end_at = outcome.window.end_at,
            "credit redeemed"
        );
        Ok((next_token, outcome))
    }

    /// Checks the token stored in the key file.
    ///
    /// # Errors
    ///
    /// Same as [`CreditEngine::redeem`], without modifying anything except
    /// retiring an expired or exhausted token.
    pub fn check_stored(&self, cost: i64) -> CreditResult<Outcome> {
        let store = self.store.as_ref().ok_or(CreditError::MissingStorageDir)?;
        let token = store
            .load()?
            .ok_or_else(|| CreditError::NoToken(store.key_path()))?;
        self.check(&token, cost)
    }

    /// Decodes a token without ledger, version or window checks.
    ///
    /// # Errors
    ///
    /// Returns the codec's errors.
    pub fn inspect(&self, token: &str) -> CreditResult<CreditRecord> {
        self.codec.decode(token)
    }

    fn resolve_cost(&self, cost: i64) -> i64 {
        if cost <= 0 { self.default_cost } else { cost }
    }

    /// Validates a token up to the window and balance checks.
    fn admit(&self, token: &str) -> CreditResult<CreditRecord> {
        if token.is_empty() {
            return Err(CreditError::EmptyToken);
        }
        if self.ledger.is_recorded(token)? {
            return Err(CreditError::AlreadyConsumed);
        }

        let record = self.codec.decode(token)?;
        let current = self.version.current_version();
        if record.version != current {
            return Err(CreditError::VersionMismatch {
                record_version: record.version,
                current_version: current.to_string(),
            });
        }
        Ok(record)
    }

    /// Applies the window and balance policy, retiring dead tokens.
    fn enforce(
        &self,
        token: &str,
        record: &CreditRecord,
        window: Window,
        cost: i64,
        now: i64,
    ) -> CreditResult<()> {
        if window.has_ended(now) {
            self.ledger.retire_quietly(token);
            info!(end_at = window.end_at, "credit token expired");
            return Err(CreditError::Expired {
                end_at: window.end_at,
                record: record.clone(),
            });
        }

        if record.points < cost {
            if record.points <= 0 {
                self.ledger.retire_quietly(token);
            }
            return Err(CreditError::InsufficientBalance {
                points: record.points,
                cost,
                record: record.clone(),
            });
        }
        Ok(())
    }

    /// Validates and debits without touching the ledger or the key file.
    fn debit(&self, token: &str, cost: i64, now: i64) -> CreditResult<(String, Outcome)> {
        let cost = self.resolve_cost(cost);
        let record = self.admit(token)?;
        let window = record.effective_window(now);
        self.enforce(token, &record, window, cost, now)?;

        let next = record.debited(cost, now);
        let next_token = self.codec.encode(&next)?;

        debug!(
            before = record.points,
            after = next.points,
            activated = record.start_at != next.start_at,
            "credit debited"
        );
        Ok((next_token, Outcome::new(next, window, now)))
    }
}

impl Default for CreditEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Hands a replacement token back when its key-file replace fails.
fn unsaved(token: String, err: CreditError) -> CreditError {
    match err {
        CreditError::PersistFailed(source) => CreditError::ReplacementUnsaved { token, source },
        other => other,
    }
}
