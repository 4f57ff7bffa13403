//! HS256 mint/verify over `dfs_types::jwt::Claims`, §6. This crate is the
//! only one that ever holds `JWT_SECRET_KEY` directly; every other service
//! resolves a JWT by asking this one over AMQP.
//!
//! Grounded on `original_source/auth/controllers/authController.go`'s
//! `jwt.NewWithClaims(jwt.SigningMethodHS256, ...)`/`ParseWithClaims` pair.

use chrono::{Duration, Utc};
use dfs_types::jwt::Claims;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

const SESSION_TTL_HOURS: i64 = 24;

pub fn mint(user_id: i64, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, Utc::now() + Duration::hours(SESSION_TTL_HOURS));
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Returns `None` on any parse/signature/expiry failure, matching the Go
/// RPC handlers' "return false/null on any failure" contract (§6).
pub fn verify(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_user_id() {
        let token = mint(42, "secret").unwrap();
        let claims = verify(&token, "secret").unwrap();
        assert_eq!(claims.user_id(), Some(42));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint(42, "secret").unwrap();
        assert!(verify(&token, "other-secret").is_none());
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(verify("not-a-jwt", "secret").is_none());
    }
}
