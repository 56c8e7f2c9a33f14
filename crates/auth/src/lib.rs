//! Registration, login, and token verification for the order API.
//!
//! Passwords are stored as argon2 hashes and never logged. Access
//! tokens are RS256 JWTs carrying the user id as subject, valid for
//! one hour. Login failures are reported uniformly so the API never
//! reveals whether an email is registered.

mod error;
mod password;
mod service;
mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use service::AuthService;
pub use token::{Claims, TOKEN_TTL, TokenService};
