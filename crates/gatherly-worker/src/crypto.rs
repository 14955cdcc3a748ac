use std::num::NonZeroU32;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::util::random_bytes;

const OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 64;

/// A PBKDF2-SHA256 password hash together with the parameters needed to re-derive it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: NonZeroU32,
}

/// Derive the server-side password hash with a fresh random salt.
pub fn hash_password(password: &[u8], iterations: NonZeroU32) -> PasswordHash {
    let salt = random_bytes(SALT_LEN);
    let hash = derive(password, &salt, iterations);
    PasswordHash {
        hash,
        salt,
        iterations,
    }
}

pub fn verify_password_hash(password: &[u8], stored: &PasswordHash) -> bool {
    if stored.hash.len() != OUTPUT_LEN {
        return false;
    }

    // Derive and constant-time compare.
    let out = derive(password, &stored.salt, stored.iterations);
    out.as_slice().ct_eq(stored.hash.as_slice()).into()
}

/// Constant-time equality for short secrets such as verification codes.
pub fn secrets_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn derive(password: &[u8], salt: &[u8], iterations: NonZeroU32) -> Vec<u8> {
    let mut out = vec![0u8; OUTPUT_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations.get(), &mut out);
    out
}
