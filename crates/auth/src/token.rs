use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// How long an issued access token stays valid.
pub const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// JWT claims carried by an access token. The subject is the user id
/// rendered as a decimal string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issues and verifies RS256 tokens from an RSA keypair.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Loads the signing keypair from PEM files on disk.
    pub fn from_pem_files(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<Self, AuthError> {
        let private = std::fs::read(private_path.as_ref())
            .map_err(|err| AuthError::Keys(format!("reading private key: {err}")))?;
        let public = std::fs::read(public_path.as_ref())
            .map_err(|err| AuthError::Keys(format!("reading public key: {err}")))?;
        Self::from_pems(&private, &public)
    }

    pub fn from_pems(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, AuthError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|err| AuthError::Keys(format!("parsing private key: {err}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|err| AuthError::Keys(format!("parsing public key: {err}")))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        Ok(Self {
            encoding,
            decoding,
            validation,
        })
    }

    /// Issues a token for `user_id` expiring one hour from now.
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        let now = Utc::now();
        self.issue_at(user_id, now, now + TOKEN_TTL)
    }

    /// Issues a token with explicit issue and expiry instants.
    pub fn issue_at(
        &self,
        user_id: UserId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verifies a token's signature and expiry and returns the subject
    /// user id.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;
        let id: i64 = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(UserId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const PRIVATE_PEM: &[u8] = include_bytes!("../../../testdata/jwt-private.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../../../testdata/jwt-public.pem");
    const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("../../../testdata/other-private.pem");

    fn service() -> TokenService {
        TokenService::from_pems(PRIVATE_PEM, PUBLIC_PEM).unwrap()
    }

    #[test]
    fn issued_token_verifies_to_the_same_user() {
        let svc = service();
        let token = svc.issue(UserId::new(42)).unwrap();
        assert_eq!(svc.verify(&token).unwrap(), UserId::new(42));
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let svc = service();
        let issued = Utc::now() - ChronoDuration::hours(2);
        let token = svc
            .issue_at(UserId::new(42), issued, issued + ChronoDuration::hours(1))
            .unwrap();
        assert!(matches!(svc.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn token_signed_with_another_key_is_invalid() {
        let svc = service();
        let other = TokenService::from_pems(OTHER_PRIVATE_PEM, PUBLIC_PEM).unwrap();
        let token = other.issue(UserId::new(42)).unwrap();
        assert!(matches!(svc.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let svc = service();
        assert!(matches!(
            svc.verify("not.a.token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn non_numeric_subject_is_invalid() {
        let svc = service();
        let claims = Claims {
            sub: "alice".to_string(),
            exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
            iat: Utc::now().timestamp(),
        };
        let token = encode(&Header::new(Algorithm::RS256), &claims, &svc.encoding).unwrap();
        assert!(matches!(svc.verify(&token), Err(AuthError::InvalidToken)));
    }
}
