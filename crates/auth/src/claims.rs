use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use itemgate_core::UserId;

/// Lifetime of an issued token.
pub const TOKEN_TTL: Duration = Duration::hours(24);

/// JWT claims carried by a bearer token.
///
/// Only the identity travels in the token. The caller's role and permissions
/// are resolved from storage on every request, so a role change applies
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Not-before (unix seconds).
    pub nbf: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        let issued = now.timestamp();
        Self {
            user_id,
            iat: issued,
            nbf: issued,
            exp: (now + TOKEN_TTL).timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time-based claims.
///
/// Signature verification happens before this, in [`crate::Hs256JwtService`].
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_claims_are_valid() {
        let now = Utc::now();
        let claims = Claims::new(UserId::new(7), now);
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
        assert_eq!(claims.nbf, claims.iat);
        assert!(validate_claims(&claims, now).is_ok());
    }

    #[test]
    fn expiry_instant_is_exclusive() {
        let now = Utc::now();
        let claims = Claims::new(UserId::new(7), now);
        assert_eq!(
            validate_claims(&claims, now + TOKEN_TTL),
            Err(TokenValidationError::Expired)
        );
        assert!(validate_claims(&claims, now + TOKEN_TTL - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn not_before_is_enforced() {
        let now = Utc::now();
        let claims = Claims::new(UserId::new(7), now);
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let mut claims = Claims::new(UserId::new(7), now);
        claims.exp = claims.iat;
        assert_eq!(
            validate_claims(&claims, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
