use std::sync::Arc;

use common::UserId;
use store::{StoreError, UserStore};
use tracing::info;

use crate::password::{hash_password, verify_password};
use crate::token::TokenService;
use crate::AuthError;

const PASSWORD_MIN: usize = 5;
const PASSWORD_MAX: usize = 20;

/// Registration, login, and token checks over a user store.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// Registers a new account and returns the assigned user id.
    ///
    /// Emails are normalized to lowercase before storage so lookups
    /// are case-insensitive.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let hash = hash_password(password)?;
        let id = match self.users.insert_user(&email, &hash).await {
            Ok(id) => id,
            Err(StoreError::DuplicateEmail(email)) => {
                return Err(AuthError::DuplicateEmail(email));
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = %id, "registered user");
        Ok(id)
    }

    /// Checks credentials and returns a fresh access token.
    ///
    /// Unknown email and wrong password both fail with
    /// `InvalidCredentials`; the password check runs either way so the
    /// two paths take comparable time.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        let record = self.users.find_by_email(&email).await?;
        let verified = match &record {
            Some(user) => verify_password(password, &user.password_hash),
            None => {
                // Burn a hash comparison on a throwaway value.
                verify_password(password, dummy_hash());
                false
            }
        };
        match (record, verified) {
            (Some(user), true) => self.tokens.issue(user.id),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    /// Verifies a bearer token and confirms the subject still exists.
    pub async fn validate(&self, token: &str) -> Result<UserId, AuthError> {
        let user_id = self.tokens.verify(token)?;
        if self.users.user_exists(user_id).await? {
            Ok(user_id)
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

// A hash of a fixed throwaway password, used to equalize timing when
// the email is unknown.
static DUMMY_HASH: std::sync::OnceLock<String> = std::sync::OnceLock::new();

fn dummy_hash() -> &'static str {
    DUMMY_HASH.get_or_init(|| hash_password("throwaway0").unwrap_or_default())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !email[local.len() + 1..].contains('@')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::Validation("invalid email address".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"
        )));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::Validation(
            "password must contain only letters and digits".to_string(),
        ));
    }
    Ok(())
}
