use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatehouse_core::UserId;

/// Bearer token claims (transport-agnostic).
///
/// Only `sub` and `exp` are required. The remaining claims are informational:
/// the principal is always rebuilt from the stored user record, so a token's
/// `email`/`role` are never trusted and `iat` is not checked.
///
/// Timestamps are seconds since the Unix epoch, as registered JWT claims are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Expiration timestamp.
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Issued-at timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,
}

/// Deterministically validate the expiry of decoded claims.
///
/// Signature verification happens before this; see [`crate::TokenVerifier`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if now.timestamp() >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(iat: Option<DateTime<Utc>>, exp: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            exp: exp.timestamp(),
            email: None,
            role: None,
            iat: iat.map(|t| t.timestamp()),
        }
    }

    #[test]
    fn accepts_token_before_expiry() {
        let now = Utc::now();
        let c = claims(Some(now - Duration::minutes(1)), now + Duration::minutes(10));
        assert_eq!(validate_claims(&c, now), Ok(()));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        let c = claims(Some(now - Duration::minutes(10)), now);
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn issued_at_is_not_checked() {
        let now = Utc::now();
        let skewed = claims(Some(now + Duration::seconds(2)), now + Duration::minutes(10));
        assert_eq!(validate_claims(&skewed, now), Ok(()));

        let bare = claims(None, now + Duration::minutes(10));
        assert_eq!(validate_claims(&bare, now), Ok(()));
    }

    #[test]
    fn optional_claims_may_be_absent_or_free_form() {
        let sub = UserId::new();
        let minimal: JwtClaims =
            serde_json::from_value(serde_json::json!({ "sub": sub, "exp": 1 })).unwrap();
        assert_eq!(minimal.sub, sub);
        assert_eq!((minimal.email, minimal.role, minimal.iat), (None, None, None));

        let lowercase_role: JwtClaims = serde_json::from_value(serde_json::json!({
            "sub": sub, "exp": 1, "role": "user", "email": "a@b.test", "iat": 0,
        }))
        .unwrap();
        assert_eq!(lowercase_role.role.as_deref(), Some("user"));
    }
}
