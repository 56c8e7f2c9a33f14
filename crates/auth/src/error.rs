use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two cases are deliberately
    /// indistinguishable to callers.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    Validation(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("failed to load signing keys: {0}")]
    Keys(String),

    #[error("password hashing failed")]
    Hashing,

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] store::StoreError),
}
