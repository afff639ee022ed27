//! Argon2 password hashing

use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use rand::RngCore;

/// Well-formed hash at the default cost that no password verifies against
///
/// Checked in place of a real hash when the username is unknown, so both
/// failure paths run one full Argon2 verification.
pub(crate) const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$Z2xvYmFsYmFuay1kdW1teQ$iByi0zhZ260gQTYkCKuiWJU8LLJ+yVqc0Vr/MDNe1cQ";

/// Hash a password into a PHC string with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against a stored PHC string.
///
/// A malformed hash never verifies.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
