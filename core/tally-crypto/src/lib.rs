//! Encryption layer for Tally credit tokens.
//!
//! Tokens are sealed with ChaCha20-Poly1305 (256-bit key, 96-bit nonce,
//! 128-bit tag) and carried as base64 text. The key is shared by every
//! deployment of a build, so this layer provides tamper detection and
//! obfuscation rather than per-user confidentiality.

mod cipher;
mod error;
mod key;

pub use cipher::{
    EncryptedData, NONCE_SIZE, TAG_SIZE, decrypt, encrypt, open_from_base64, seal_to_base64,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, TokenKey};
