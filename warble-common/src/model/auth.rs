use crate::{
    error::DomainError,
    model::{Id, user::UserMarker},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const ACCESS_TOKEN_MAX_AGE: Duration = Duration::hours(24);
pub const REFRESH_TOKEN_MAX_AGE: Duration = Duration::days(30);
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const PASSWORD_MIN_LEN: usize = 4;
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn max_age(self) -> Duration {
        match self {
            TokenKind::Access => ACCESS_TOKEN_MAX_AGE,
            TokenKind::Refresh => REFRESH_TOKEN_MAX_AGE,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("The token has expired")]
    Expired,
    #[error("The token is invalid: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("Signing the token failed: {0}")]
    Sign(jsonwebtoken::errors::Error),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct Claims {
    sub: Id<UserMarker>,
    iat: i64,
    exp: i64,
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies HS256 session tokens. Access and refresh tokens use
/// separate secrets so that one can never stand in for the other.
pub struct TokenService {
    access: TokenKeys,
    refresh: TokenKeys,
    validation: Validation,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenService {
    #[must_use]
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access: TokenKeys::from_secret(access_secret),
            refresh: TokenKeys::from_secret(refresh_secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn keys(&self, kind: TokenKind) -> &TokenKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, kind: TokenKind, user: Id<UserMarker>) -> Result<String, TokenError> {
        self.issue_at(kind, user, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        kind: TokenKind,
        user: Id<UserMarker>,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + kind.max_age()).unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(TokenError::Sign)
    }

    pub fn issue_pair(&self, user: Id<UserMarker>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(TokenKind::Access, user)?,
            refresh: self.issue(TokenKind::Refresh, user)?,
        })
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Id<UserMarker>, TokenError> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
                .map_err(|err| match err.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid(err),
                })?;

        Ok(data.claims.sub)
    }
}

impl Debug for TokenService {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access", &"[redacted]")
            .field("refresh", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl Debug for TokenPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[redacted]")
            .field("refresh", &"[redacted]")
            .finish()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

pub fn check_password_strength(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        Err(DomainError::InvalidPassword)
    } else {
        Ok(())
    }
}

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordHashError)?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordHashError> {
    let parsed = PasswordHash::new(hash).map_err(PasswordHashError)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordHashError(err)),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::DomainError,
        model::{
            Id,
            auth::{
                TokenError, TokenKind, TokenService, check_password_strength, hash_password,
                verify_password,
            },
            user::UserMarker,
        },
    };
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn service() -> TokenService {
        TokenService::new("access secret", "refresh secret")
    }

    fn user() -> Id<UserMarker> {
        Id::new(Uuid::from_u128(0x1234))
    }

    #[test]
    fn token_round_trip() {
        let service = service();
        let token = service.issue(TokenKind::Access, user()).unwrap();
        assert_eq!(service.verify(TokenKind::Access, &token).unwrap(), user());

        let pair = service.issue_pair(user()).unwrap();
        assert_eq!(service.verify(TokenKind::Refresh, &pair.refresh).unwrap(), user());
    }

    #[test]
    fn token_kinds_do_not_mix() {
        let service = service();
        let refresh = service.issue(TokenKind::Refresh, user()).unwrap();
        assert!(matches!(
            service.verify(TokenKind::Access, &refresh),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token() {
        let service = service();
        let issued_at = OffsetDateTime::now_utc() - Duration::days(2);
        let token = service
            .issue_at(TokenKind::Access, user(), issued_at)
            .unwrap();
        assert!(matches!(
            service.verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        ));

        let refresh = service
            .issue_at(TokenKind::Refresh, user(), issued_at)
            .unwrap();
        assert!(service.verify(TokenKind::Refresh, &refresh).is_ok());
    }

    #[test]
    fn garbage_token() {
        assert!(matches!(
            service().verify(TokenKind::Access, "not.a.token"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn password_hashing() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
        assert!(verify_password("hunter22", "not a phc string").is_err());
        assert_ne!(hash, hash_password("hunter22").unwrap());
    }

    #[test]
    fn password_strength() {
        assert_eq!(
            check_password_strength("abc"),
            Err(DomainError::InvalidPassword)
        );
        assert_eq!(check_password_strength("abcd"), Ok(()));
    }
}
