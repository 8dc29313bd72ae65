//! Argon2 password hashing (PHC string format).

use argon2::{
    Argon2, Params, PasswordHasher, PasswordVerifier,
    password_hash::{self, PasswordHash, SaltString},
};
use tracing::warn;

/// Hash a password into a PHC string with the given Argon2id parameters.
///
/// # Errors
/// Returns an error if salt generation or hashing fails.
pub fn hash_password(password: &str, params: Params) -> Result<String, password_hash::Error> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|_| password_hash::Error::Crypto)?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Verify a password against a PHC string. Malformed hashes never verify.
#[must_use]
pub fn verify_password(phc: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    // Parameters come from the PHC string, not from this instance.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
