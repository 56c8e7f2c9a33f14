use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};

use crate::AuthError;

/// Hashes a password with argon2id and a fresh random salt. The
/// returned PHC string embeds the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| {
            tracing::error!(%err, "argon2 hashing failed");
            AuthError::Hashing
        })?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC hash. A malformed stored
/// hash verifies as false rather than erroring, so login failures stay
/// uniform.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!(%err, "stored password hash is malformed");
            false
        }
    }
}
