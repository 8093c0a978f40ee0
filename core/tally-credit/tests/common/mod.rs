//! Shared test helpers for credit tests.

#![allow(dead_code)]

use std::path::Path;
use tally_credit::{CreditEngine, CreditRecord, EngineConfig, Issuer, TokenCodec, VersionGate};
use tally_crypto::TokenKey;

/// A fixed moment used as "now" by most tests (2025-01-01 00:00:00 UTC).
pub const T0: i64 = 1_735_689_600;

/// Returns a deterministic key from a fixed seed.
pub fn test_key() -> TokenKey {
    let seed: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31, 32,
    ];
    TokenKey::from_bytes(seed)
}

/// Configuration using the test key and version `v1`, rooted at `dir`.
pub fn test_config(dir: &Path) -> EngineConfig {
    EngineConfig::for_install_dir(dir)
        .with_key(test_key())
        .with_version(VersionGate::fixed("v1"))
}

/// An engine rooted at `dir` with the test key and version `v1`.
pub fn test_engine(dir: &Path) -> CreditEngine {
    CreditEngine::new(test_config(dir))
}

/// A codec using the test key.
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(test_key())
}

/// An issuer using the test key and version `version`.
pub fn test_issuer(version: &str) -> Issuer {
    Issuer::new(test_codec(), VersionGate::fixed(version))
}

/// Encodes an explicit record with the test key.
pub fn mint(record: &CreditRecord) -> String {
    test_codec().encode(record).unwrap()
}

/// Encodes an active `v1` record with the given window.
pub fn mint_active(points: i64, start_at: i64, end_at: i64) -> String {
    mint(&CreditRecord::new("v1", points, start_at, end_at))
}
