use {
    super::Passphrase,
    crate::error::{Error, Result},
    pbkdf2::pbkdf2_hmac,
    sha2::Sha256,
};

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;
pub const PBKDF2_ROUNDS: u32 = 100_000;

/// Derives the 256-bit key of one chunk.
#[inline]
pub fn derive_key(passphrase: &Passphrase, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    if salt.len() != SALT_LEN {
        return Err(Error::KeyDerivation(format!(
            "invalid salt length; got {}, expected {SALT_LEN}",
            salt.len(),
        )));
    }
    Ok(pbkdf2_sha256(
        passphrase.as_unmasked_str().as_bytes(),
        salt,
        PBKDF2_ROUNDS,
    ))
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0_u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut key);
    key
}
