//! Token Service: HS256 bearer token issuance and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use itemgate_core::{DomainError, UserId};

use crate::claims::{Claims, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No `Authorization` header on the request.
    #[error("missing authorization header")]
    MissingHeader,

    /// `Authorization` header present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Bad signature, foreign algorithm, expired, or malformed claims.
    #[error("invalid token")]
    InvalidToken,

    #[error("failed to sign token")]
    Signing,
}

impl From<TokenError> for DomainError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Signing => DomainError::internal("failed to sign token"),
            _ => DomainError::unauthenticated("user not authenticated"),
        }
    }
}

/// Verifies a bearer token and yields the authenticated user.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError>;
}

/// HMAC-signed JWT issuer/verifier.
///
/// The secret is fixed at construction; the service is immutable afterwards
/// and is shared by reference across requests.
#[derive(Clone)]
pub struct Hs256JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for Hs256JwtService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtService").finish_non_exhaustive()
    }
}

impl Hs256JwtService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Any HMAC variant is accepted; asymmetric algorithms are not.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        // Time claims are checked by `validate_claims` against an explicit clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token valid from now for [`crate::TOKEN_TTL`].
    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims::new(user_id, now);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to sign token");
            TokenError::Signing
        })
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.validate(token, Utc::now())
    }
}

impl JwtValidator for Hs256JwtService {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::InvalidToken
            })?;

        validate_claims(&data.claims, now).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            TokenError::InvalidToken
        })?;

        Ok(data.claims.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TOKEN_TTL;
    use chrono::Duration;
    use proptest::prelude::*;
    use serde_json::json;

    fn service() -> Hs256JwtService {
        Hs256JwtService::new("test-secret")
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let svc = service();
        let token = svc.issue(UserId::new(12)).unwrap();
        assert_eq!(svc.verify(&token), Ok(UserId::new(12)));
    }

    #[test]
    fn token_fails_after_expiry_instant() {
        let svc = service();
        let issued = Utc::now();
        let token = svc.issue_at(UserId::new(3), issued).unwrap();

        assert!(svc.validate(&token, issued + TOKEN_TTL - Duration::seconds(1)).is_ok());
        assert_eq!(
            svc.validate(&token, issued + TOKEN_TTL),
            Err(TokenError::InvalidToken)
        );
    }

    #[test]
    fn token_from_the_past_is_expired() {
        let svc = service();
        let token = svc
            .issue_at(UserId::new(3), Utc::now() - Duration::hours(25))
            .unwrap();
        assert_eq!(svc.verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = Hs256JwtService::new("other-secret")
            .issue(UserId::new(1))
            .unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn other_hmac_variants_are_accepted() {
        let claims = Claims::new(UserId::new(5), Utc::now());
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(service().verify(&token), Ok(UserId::new(5)));
    }

    fn hand_built_token(header: serde_json::Value, signature: &str) -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let claims = Claims::new(UserId::new(5), Utc::now());
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_string(&claims).unwrap());
        format!("{header}.{claims}.{signature}")
    }

    #[test]
    fn unsigned_token_is_rejected() {
        let token = hand_built_token(json!({ "alg": "none", "typ": "JWT" }), "");
        assert_eq!(service().verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn asymmetric_algorithm_is_rejected() {
        let token = hand_built_token(json!({ "alg": "RS256", "typ": "JWT" }), "c2lnbmF0dXJl");
        assert_eq!(service().verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn malformed_claims_are_rejected() {
        let now = Utc::now().timestamp();
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "someone", "exp": now + 60, "nbf": now }),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(service().verify(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(service().verify("not.a.jwt"), Err(TokenError::InvalidToken));
        assert_eq!(service().verify(""), Err(TokenError::InvalidToken));
    }

    #[test]
    fn token_errors_map_to_unauthenticated() {
        let err: DomainError = TokenError::InvalidToken.into();
        assert!(matches!(err, DomainError::Unauthenticated(_)));
        let err: DomainError = TokenError::MissingHeader.into();
        assert!(matches!(err, DomainError::Unauthenticated(_)));
    }

    proptest! {
        #[test]
        fn verify_inverts_issue(id in 1i64..i64::MAX) {
            let svc = service();
            let token = svc.issue(UserId::new(id)).unwrap();
            prop_assert_eq!(svc.verify(&token), Ok(UserId::new(id)));
        }
    }
}
