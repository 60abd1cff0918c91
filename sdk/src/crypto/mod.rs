//! Every chunk is encrypted on its own with AES-256-GCM.
//!
//! The key of a chunk is derived from the user's passphrase and a random 16-byte salt
//! using PBKDF2-HMAC-SHA256 with 100,000 iterations. Each chunk gets a fresh salt and
//! a fresh 12-byte IV, so no two chunks share a key even when the same passphrase
//! is used for many files. Keys are not cached between chunks.
//!
//! An encrypted chunk is stored in the following form:
//!
//! - salt (128 bits)
//! - IV (96 bits)
//! - ciphertext, followed by the 128-bit GCM tag
//!
//! The stored chunk is self-contained: the passphrase is the only other input needed
//! to decrypt it. A failed tag check means the passphrase is wrong or the data was
//! modified, and no plaintext is returned in that case.

mod cipher;
mod kdf;

pub use self::{
    cipher::{ChunkCipher, EncryptedChunk, IV_LEN, OVERHEAD, TAG_LEN},
    kdf::{KEY_LEN, PBKDF2_ROUNDS, SALT_LEN, derive_key},
};
use {
    crate::error::{Error, Result},
    std::{
        fmt::{self, Debug},
        str::FromStr,
    },
};

/// Secret used to derive chunk keys. Lives in memory only for one operation.
#[derive(Clone)]
pub struct Passphrase(String);

impl Passphrase {
    #[inline]
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::Validation("passphrase cannot be empty".into()));
        }
        Ok(Self(value))
    }

    #[must_use]
    #[inline]
    pub fn as_unmasked_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Passphrase {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Debug for Passphrase {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passphrase").finish()
    }
}
