use {
    super::{
        Passphrase,
        kdf::{SALT_LEN, derive_key},
    },
    crate::{
        chunker::Chunk,
        error::{Error, Result},
    },
    aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit},
    },
    rand::RngCore,
    std::fmt::{self, Debug},
};

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Bytes an encrypted chunk has on top of its plaintext.
pub const OVERHEAD: usize = SALT_LEN + IV_LEN + TAG_LEN;

#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedChunk {
    /// Serializes as `salt || iv || ciphertext`.
    #[must_use]
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encrypted_len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    #[inline]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < OVERHEAD {
            return Err(Error::Integrity(format!(
                "encrypted chunk is too short: {} bytes (minimum {OVERHEAD})",
                data.len(),
            )));
        }
        let (salt, rest) = data.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);
        Ok(Self {
            salt: salt.try_into().map_err(Error::integrity)?,
            iv: iv.try_into().map_err(Error::integrity)?,
            ciphertext: ciphertext.to_vec(),
        })
    }

    #[must_use]
    #[inline]
    pub fn encrypted_len(&self) -> usize {
        SALT_LEN + IV_LEN + self.ciphertext.len()
    }

    #[must_use]
    #[inline]
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_LEN)
    }
}

impl Debug for EncryptedChunk {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedChunk")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Encrypts and decrypts single chunks with keys derived from one passphrase.
#[derive(Debug, Clone)]
pub struct ChunkCipher {
    passphrase: Passphrase,
}

impl ChunkCipher {
    #[must_use]
    #[inline]
    pub fn new(passphrase: Passphrase) -> Self {
        Self { passphrase }
    }

    #[inline]
    pub fn encrypt_chunk(&self, chunk: &Chunk) -> Result<EncryptedChunk> {
        self.encrypt(&chunk.bytes)
    }

    /// Encrypts with a fresh random salt and IV.
    #[inline]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedChunk> {
        let mut salt = [0_u8; SALT_LEN];
        let mut iv = [0_u8; IV_LEN];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = derive_key(&self.passphrase, &salt)?;
        let ciphertext = Aes256Gcm::new(&key.into())
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(encryption_failed)?;
        Ok(EncryptedChunk {
            salt,
            iv,
            ciphertext,
        })
    }

    #[inline]
    pub fn decrypt(&self, chunk: &EncryptedChunk) -> Result<Vec<u8>> {
        if chunk.ciphertext.len() < TAG_LEN {
            return Err(Error::Integrity(format!(
                "ciphertext is too short: {} bytes",
                chunk.ciphertext.len(),
            )));
        }
        let key = derive_key(&self.passphrase, &chunk.salt)?;
        Aes256Gcm::new(&key.into())
            .decrypt(Nonce::from_slice(&chunk.iv), chunk.ciphertext.as_slice())
            .map_err(|aes_gcm::Error| Error::Authentication)
    }

    /// Decrypts the `salt || iv || ciphertext` layout.
    #[inline]
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.decrypt(&EncryptedChunk::from_bytes(data)?)
    }
}

fn encryption_failed(err: aes_gcm::Error) -> Error {
    Error::Encryption(format!("chunk encryption failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(passphrase: &str) -> ChunkCipher {
        ChunkCipher::new(Passphrase::new(passphrase).unwrap())
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|_| rand::random::<u8>()).collect()
    }

    #[test]
    fn roundtrip() {
        let cipher = cipher("correct horse battery staple");
        for len in [0, 1, 15, 16, 17, 1000, 65_537] {
            let chunk = Chunk {
                index: 3,
                bytes: random_bytes(len),
            };
            let encrypted = cipher.encrypt_chunk(&chunk).unwrap();
            assert_eq!(encrypted.encrypted_len(), len + OVERHEAD);
            assert_eq!(encrypted.plaintext_len(), len);
            let bytes = encrypted.to_bytes();
            assert_eq!(bytes.len(), len + OVERHEAD);
            assert_eq!(cipher.decrypt_bytes(&bytes).unwrap(), chunk.bytes);
        }
    }

    #[test]
    fn layout() {
        let cipher = cipher("pw");
        let encrypted = cipher.encrypt(b"hello").unwrap();
        let bytes = encrypted.to_bytes();
        assert_eq!(bytes[..SALT_LEN], encrypted.salt);
        assert_eq!(bytes[SALT_LEN..SALT_LEN + IV_LEN], encrypted.iv);
        assert_eq!(bytes[SALT_LEN + IV_LEN..], encrypted.ciphertext);
        assert_eq!(EncryptedChunk::from_bytes(&bytes).unwrap(), encrypted);
    }

    #[test]
    fn fresh_salt_and_iv() {
        let cipher = cipher("pw");
        let a = cipher.encrypt(b"same plaintext").unwrap();
        let b = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_passphrase() {
        let encrypted = cipher("first").encrypt(b"secret data").unwrap();
        for other in ["second", "First", "first ", "f"] {
            assert!(matches!(
                cipher(other).decrypt(&encrypted),
                Err(Error::Authentication)
            ));
        }
    }

    #[test]
    fn tampering() {
        let cipher = cipher("pw");
        let bytes = cipher.encrypt(&random_bytes(100)).unwrap().to_bytes();
        // salt, IV, ciphertext body, tag
        for position in [0, SALT_LEN, SALT_LEN + IV_LEN + 5, bytes.len() - 1] {
            let mut tampered = bytes.clone();
            tampered[position] ^= 0x01;
            assert!(
                matches!(cipher.decrypt_bytes(&tampered), Err(Error::Authentication)),
                "position {position}"
            );
        }
        let mut extended = bytes.clone();
        extended.push(0);
        assert!(matches!(
            cipher.decrypt_bytes(&extended),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn truncated() {
        let cipher = cipher("pw");
        let bytes = cipher.encrypt(b"").unwrap().to_bytes();
        assert_eq!(bytes.len(), OVERHEAD);
        assert!(matches!(
            cipher.decrypt_bytes(&bytes[..OVERHEAD - 1]),
            Err(Error::Integrity(_))
        ));
        assert!(matches!(
            cipher.decrypt_bytes(&[]),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn encryption_failure_is_final() {
        let err = encryption_failed(aes_gcm::Error);
        assert!(matches!(err, Error::Encryption(_)), "{err:?}");
        assert!(!err.is_transient());
    }
}
