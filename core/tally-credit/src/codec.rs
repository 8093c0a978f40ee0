//! Token encoding: record JSON sealed with ChaCha20-Poly1305, framed as base64.
//!
//! Token format: `base64(nonce || ciphertext || tag)` where the plaintext is
//! the compact JSON object `{"version","points","start_at","end_at"}`.

use crate::error::{CreditError, CreditResult};
use crate::record::CreditRecord;
use tally_crypto::{CryptoError, TokenKey, open_from_base64, seal_to_base64};

/// Build-embedded token key shared by every deployment of this build.
const EMBEDDED_KEY: [u8; 32] = *b"tally_credit_token_key_v1_32byt!";

/// Returns the key compiled into this build.
#[must_use]
pub fn embedded_key() -> TokenKey {
    TokenKey::from_bytes(EMBEDDED_KEY)
}

/// Encodes and decodes credit tokens under one key.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: TokenKey,
}

impl TokenCodec {
    /// Creates a codec for the given key.
    #[must_use]
    pub fn new(key: TokenKey) -> Self {
        Self { key }
    }

    /// Creates a codec using the key compiled into this build.
    #[must_use]
    pub fn embedded() -> Self {
        Self::new(embedded_key())
    }

    /// Seals a record into a token string.
    ///
    /// Every call draws a fresh nonce, so encoding the same record twice
    /// yields different tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError::EncodingFailed`] if serialization or
    /// encryption fails.
    pub fn encode(&self, record: &CreditRecord) -> CreditResult<String> {
        let plaintext =
            serde_json::to_vec(record).map_err(|e| CreditError::EncodingFailed(e.to_string()))?;
        seal_to_base64(&self.key, &plaintext)
            .map_err(|e| CreditError::EncodingFailed(e.to_string()))
    }

    /// Opens a token string and returns its record.
    ///
    /// No version or window checks happen here.
    ///
    /// # Errors
    ///
    /// - [`CreditError::EmptyToken`] for an empty string
    /// - [`CreditError::MalformedToken`] for bad base64, short data or an
    ///   undecodable payload
    /// - [`CreditError::AuthenticationFailed`] if the tag does not verify
    pub fn decode(&self, token: &str) -> CreditResult<CreditRecord> {
        if token.is_empty() {
            return Err(CreditError::EmptyToken);
        }

        let plaintext = open_from_base64(&self.key, token).map_err(|e| match e {
            CryptoError::Authentication => CreditError::AuthenticationFailed,
            other => CreditError::MalformedToken(other.to_string()),
        })?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| CreditError::MalformedToken(format!("invalid payload: {e}")))
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::embedded()
    }
}
