//! Error types for the credit engine.

use crate::record::CreditRecord;
use chrono::{Local, TimeZone};
use std::path::PathBuf;
use thiserror::Error;

/// Credit-specific errors.
///
/// Policy rejections carry the decoded record so callers can still show
/// the remaining balance and window.
#[derive(Debug, Error)]
pub enum CreditError {
    /// The token string is empty.
    #[error("no credit token configured")]
    EmptyToken,

    /// The token is not valid base64 or does not frame a record.
    #[error("malformed credit token: {0}")]
    MalformedToken(String),

    /// The authentication tag did not verify.
    #[error("credit token failed authentication (tampered or issued by another build)")]
    AuthenticationFailed,

    /// The token was minted for a different build generation.
    #[error("credit token is for version {record_version}, current version is {current_version}")]
    VersionMismatch {
        /// Version stamped into the token.
        record_version: String,
        /// Version of the running build.
        current_version: String,
    },

    /// The exact token string has been retired.
    #[error("credit token has already been used")]
    AlreadyConsumed,

    /// The validity window has closed.
    #[error("credit expired at {}", display_time(.end_at))]
    Expired {
        /// Effective end of the window.
        end_at: i64,
        /// The decoded record.
        record: CreditRecord,
    },

    /// The balance does not cover the requested cost.
    #[error("insufficient credit: have {points}, need {cost}")]
    InsufficientBalance {
        /// Current balance.
        points: i64,
        /// Requested cost.
        cost: i64,
        /// The decoded record.
        record: CreditRecord,
    },

    /// Reading or appending the replay ledger failed.
    #[error("replay ledger I/O error: {0}")]
    LedgerIo(#[source] std::io::Error),

    /// Re-encoding a debited record failed.
    #[error("failed to encode credit token: {0}")]
    EncodingFailed(String),

    /// Replacing the key file failed; the previous file was restored.
    #[error("failed to persist key file: {0}")]
    PersistFailed(#[source] std::io::Error),

    /// The old token was retired but its replacement could not be written.
    ///
    /// The key file still holds the retired token; `token` is the only copy
    /// of the remaining balance and must be persisted by the caller.
    #[error("credit was spent but the replacement token could not be saved: {source}")]
    ReplacementUnsaved {
        /// The replacement token.
        token: String,
        /// Why the key-file replace failed.
        #[source]
        source: std::io::Error,
    },

    /// The key file exists but could not be read.
    #[error("failed to read key file: {0}")]
    KeyFile(#[source] std::io::Error),

    /// The engine has no storage directory to load or persist a token.
    #[error("no storage directory configured")]
    MissingStorageDir,

    /// No token is stored in the key file.
    #[error("no credit token found in {}", .0.display())]
    NoToken(PathBuf),

    /// Fixed-window issuance with the start after the end.
    #[error("start date {start} is after end date {end}")]
    InvalidRange {
        /// Requested start date.
        start: String,
        /// Requested end date.
        end: String,
    },

    /// A date string could not be parsed or does not exist locally.
    #[error("invalid date {0:?}, expected YYYY.MM.DD, YYYY-MM-DD, YYYY/MM/DD or YYYYMMDD")]
    InvalidDate(String),

    /// Deferred issuance with a non-positive duration.
    #[error("validity must be at least one day, got {0}")]
    InvalidDuration(i64),
}

impl CreditError {
    /// Returns the decoded record attached to a policy rejection.
    #[must_use]
    pub fn record(&self) -> Option<&CreditRecord> {
        match self {
            Self::Expired { record, .. } | Self::InsufficientBalance { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Returns the replacement token that could not be written to the key file.
    #[must_use]
    pub fn unsaved_token(&self) -> Option<&str> {
        match self {
            Self::ReplacementUnsaved { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Returns true for business outcomes rather than system failures.
    #[must_use]
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConsumed | Self::Expired { .. } | Self::InsufficientBalance { .. }
        )
    }

    /// Returns true for local I/O failures that may succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LedgerIo(_) | Self::PersistFailed(_) | Self::KeyFile(_)
        )
    }
}

fn display_time(ts: &i64) -> String {
    Local
        .timestamp_opt(*ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Result type for credit operations.
pub type CreditResult<T> = Result<T, CreditError>;
