//! Error types for the encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The authentication tag did not verify (wrong key or tampered data).
    #[error("authentication failed (wrong key or tampered data)")]
    Authentication,

    /// The encoded blob could not be split into nonce and ciphertext.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
