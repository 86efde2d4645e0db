//! Sliding-window session tokens.
//!
//! A session token carries `iat` from its very first issuance. `extend`
//! re-signs with a fresh expiry but the original `iat`, so however many
//! times a client renews, the session dies within `EXTEND_LIMIT_SECS` of
//! first login.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::warn;
use uuid::Uuid;

use wisp_types::api::Claims;

use crate::error::ApiError;

/// Lifetime of a single signed token.
pub const TOKEN_TTL_SECS: i64 = 100 * 60;
/// Ceiling on total session age; extends past this return None.
pub const EXTEND_LIMIT_SECS: i64 = 60 * 60;

pub fn issue(subject: Uuid, username: &str, secret: &str) -> Result<String, ApiError> {
    issue_at(subject, username, secret, Utc::now().timestamp())
}

pub fn issue_at(
    subject: Uuid,
    username: &str,
    secret: &str,
    now: i64,
) -> Result<String, ApiError> {
    sign(
        &Claims {
            sub: subject,
            username: username.to_string(),
            iat: now as usize,
            exp: (now + TOKEN_TTL_SECS) as usize,
        },
        secret,
    )
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Auth)
}

/// Renew a still-valid token. `None` means the session hit its age ceiling
/// and the caller must authenticate again.
pub fn extend(token: &str, secret: &str) -> Result<Option<String>, ApiError> {
    extend_at(token, secret, Utc::now().timestamp())
}

pub fn extend_at(token: &str, secret: &str, now: i64) -> Result<Option<String>, ApiError> {
    let claims = verify(token, secret)?;
    let issued_at = claims.iat as i64;

    if issued_at > now {
        // Clock skew or tampering; a token from the future is never extended.
        warn!(
            "session for {} has issued_at {}s ahead of the clock",
            claims.sub,
            issued_at - now
        );
        return Err(ApiError::Auth);
    }
    if now - issued_at > EXTEND_LIMIT_SECS {
        return Ok(None);
    }

    let renewed = sign(
        &Claims {
            exp: (now + TOKEN_TTL_SECS) as usize,
            ..claims
        },
        secret,
    )?;
    Ok(Some(renewed))
}

fn sign(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn issue_verify_roundtrip() {
        let subject = Uuid::new_v4();
        let token = issue(subject, "ada", SECRET).unwrap();

        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.exp, claims.iat + TOKEN_TTL_SECS as usize);
    }

    #[test]
    fn verify_rejects_wrong_secret_and_garbage() {
        let token = issue(Uuid::new_v4(), "ada", SECRET).unwrap();
        assert!(verify(&token, "other-secret").is_err());
        assert!(verify("not-a-token", SECRET).is_err());
    }

    #[test]
    fn verify_rejects_expired_tokens() {
        let now = Utc::now().timestamp();
        // Past the TTL and well past jsonwebtoken's default leeway.
        let token = issue_at(Uuid::new_v4(), "ada", SECRET, now - TOKEN_TTL_SECS - 120).unwrap();
        assert!(verify(&token, SECRET).is_err());
    }

    #[test]
    fn extend_preserves_original_issued_at() {
        let now = Utc::now().timestamp();
        let token = issue_at(Uuid::new_v4(), "ada", SECRET, now - 3000).unwrap();

        let renewed = extend_at(&token, SECRET, now).unwrap().unwrap();
        let claims = verify(&renewed, SECRET).unwrap();
        assert_eq!(claims.iat as i64, now - 3000);
        assert_eq!(claims.exp as i64, now + TOKEN_TTL_SECS);
    }

    #[test]
    fn extend_refuses_past_the_age_ceiling() {
        let now = Utc::now().timestamp();
        let token = issue_at(Uuid::new_v4(), "ada", SECRET, now - 3700).unwrap();

        assert!(extend_at(&token, SECRET, now).unwrap().is_none());
    }

    #[test]
    fn extend_rejects_tokens_from_the_future() {
        let now = Utc::now().timestamp();
        let token = issue_at(Uuid::new_v4(), "ada", SECRET, now + 500).unwrap();

        assert!(matches!(
            extend_at(&token, SECRET, now),
            Err(ApiError::Auth)
        ));
    }

    #[test]
    fn repeated_extends_cannot_outlive_the_ceiling() {
        let first_issue = Utc::now().timestamp() - 3500;
        let mut token = issue_at(Uuid::new_v4(), "ada", SECRET, first_issue).unwrap();

        // Renew a few times inside the window; iat never moves.
        for offset in [1000, 2000, 3000] {
            token = extend_at(&token, SECRET, first_issue + offset)
                .unwrap()
                .unwrap();
            assert_eq!(verify(&token, SECRET).unwrap().iat as i64, first_issue);
        }

        assert!(
            extend_at(&token, SECRET, first_issue + 3601)
                .unwrap()
                .is_none()
        );
    }
}
