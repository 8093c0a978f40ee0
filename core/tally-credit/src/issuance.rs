//! Token issuance.
//!
//! Two modes:
//! - **fixed window**: explicit start and end dates, normalized to local
//!   00:00:00 and 23:59:59
//! - **deferred**: a duration in days; the window opens on first use
//!
//! Every token is stamped with the issuing build's current version.

use crate::codec::TokenCodec;
use crate::config::EngineConfig;
use crate::error::{CreditError, CreditResult};
use crate::record::{CreditRecord, SECS_PER_DAY, UNACTIVATED_START_AT};
use crate::version::VersionGate;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use tracing::debug;

/// Date layouts accepted by [`parse_date`].
const DATE_FORMATS: [&str; 4] = ["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parses `YYYY.MM.DD`, `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYYMMDD`.
///
/// # Errors
///
/// Returns [`CreditError::InvalidDate`] if no layout matches.
pub fn parse_date(input: &str) -> CreditResult<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .ok_or_else(|| CreditError::InvalidDate(input.to_string()))
}

/// Mints credit tokens for distribution.
#[derive(Debug, Clone, Default)]
pub struct Issuer {
    codec: TokenCodec,
    version: VersionGate,
}

impl Issuer {
    /// Creates an issuer from a codec and a version gate.
    #[must_use]
    pub fn new(codec: TokenCodec, version: VersionGate) -> Self {
        Self { codec, version }
    }

    /// Creates an issuer sharing an engine configuration's key and version.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(TokenCodec::new(config.key.clone()), config.version.clone())
    }

    /// The version stamped into issued tokens.
    pub fn version(&self) -> &str {
        self.version.current_version()
    }

    /// Builds a fixed-window record for the given calendar dates.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::InvalidRange`] if `start` is after `end`, or
    /// [`CreditError::InvalidDate`] if a boundary does not exist in local time.
    pub fn fixed_record(
        &self,
        points: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CreditResult<CreditRecord> {
        let start_at = local_timestamp(start.and_time(NaiveTime::MIN))?;
        let end_at = end_of_day(end)?;

        if start_at > end_at {
            return Err(CreditError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(CreditRecord::new(self.version(), points, start_at, end_at))
    }

    /// Builds an unactivated record valid for `days` after first use.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::InvalidDuration`] if `days` is not positive or
    /// the window end does not fit in a timestamp.
    pub fn deferred_record(&self, points: i64, days: i64) -> CreditResult<CreditRecord> {
        if days <= 0 {
            return Err(CreditError::InvalidDuration(days));
        }
        let end_at = days
            .checked_mul(SECS_PER_DAY)
            .and_then(|duration| UNACTIVATED_START_AT.checked_add(duration))
            .ok_or(CreditError::InvalidDuration(days))?;
        Ok(CreditRecord::new(
            self.version(),
            points,
            UNACTIVATED_START_AT,
            end_at,
        ))
    }

    /// Issues a fixed-window token from date strings.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::InvalidDate`], [`CreditError::InvalidRange`]
    /// or [`CreditError::EncodingFailed`].
    pub fn generate_fixed(
        &self,
        points: i64,
        start_date: &str,
        end_date: &str,
    ) -> CreditResult<String> {
        let record = self.fixed_record(points, parse_date(start_date)?, parse_date(end_date)?)?;
        debug!(
            points,
            start_at = record.start_at,
            end_at = record.end_at,
            "issuing fixed-window token"
        );
        self.codec.encode(&record)
    }

    /// Issues a deferred token valid for `days` after first use.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::InvalidDuration`] or [`CreditError::EncodingFailed`].
    pub fn generate_deferred(&self, points: i64, days: i64) -> CreditResult<String> {
        let record = self.deferred_record(points, days)?;
        self.codec.encode(&record)
    }

    /// Issues `count` deferred tokens, each under its own nonce.
    ///
    /// # Errors
    ///
    /// Stops at the first failure.
    pub fn generate_batch(
        &self,
        points: i64,
        days: i64,
        count: usize,
    ) -> CreditResult<Vec<String>> {
        let record = self.deferred_record(points, days)?;
        let tokens = (0..count)
            .map(|_| self.codec.encode(&record))
            .collect::<CreditResult<Vec<_>>>()?;
        debug!(count, points, days, version = %record.version, "issued token batch");
        Ok(tokens)
    }
}

/// 23:59:59 local time on `date`.
fn end_of_day(date: NaiveDate) -> CreditResult<i64> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| CreditError::InvalidDate(date.to_string()))?;
    local_timestamp(date.and_time(last_second))
}

fn local_timestamp(naive: NaiveDateTime) -> CreditResult<i64> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| CreditError::InvalidDate(naive.to_string()))
}
