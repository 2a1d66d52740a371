//! Signed password-reset tokens.
//!
//! A token binds the user id to the security stamp current at issue time. Any
//! credential change rotates the stamp, so a token can be redeemed at most once.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StoreError;

pub const RESET_TOKEN_PURPOSE: &str = "password_reset";
pub const RESET_TOKEN_LIFETIME: time::Duration = time::Duration::hours(24);

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    stamp: String,
    purpose: String,
    iat: usize,
    exp: usize,
}

#[derive(Clone)]
pub struct ResetTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ResetTokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: &str, security_stamp: &str) -> Result<String, StoreError> {
        let now = OffsetDateTime::now_utc();
        let claims = ResetClaims {
            sub: user_id.to_string(),
            stamp: security_stamp.to_string(),
            purpose: RESET_TOKEN_PURPOSE.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + RESET_TOKEN_LIFETIME).unix_timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| StoreError::Token(e.to_string()))
    }

    /// True when the token was issued for this user and stamp and has not expired.
    pub fn verify(&self, token: &str, user_id: &str, security_stamp: &str) -> bool {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        match decode::<ResetClaims>(token, &self.decoding, &validation) {
            Ok(data) => {
                let claims = data.claims;
                claims.purpose == RESET_TOKEN_PURPOSE
                    && claims.sub == user_id
                    && claims.stamp == security_stamp
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected password reset token");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_verifies_for_same_user_and_stamp() {
        let codec = ResetTokenCodec::new(SECRET);
        let token = codec.issue("u-1", "stamp-a").unwrap();
        assert!(codec.verify(&token, "u-1", "stamp-a"));
    }

    #[test]
    fn rotated_stamp_invalidates_token() {
        let codec = ResetTokenCodec::new(SECRET);
        let token = codec.issue("u-1", "stamp-a").unwrap();
        assert!(!codec.verify(&token, "u-1", "stamp-b"));
        assert!(!codec.verify(&token, "u-2", "stamp-a"));
    }

    #[test]
    fn foreign_key_and_garbage_are_rejected() {
        let codec = ResetTokenCodec::new(SECRET);
        let other = ResetTokenCodec::new("ffffffffffffffffffffffffffffffff");
        let token = other.issue("u-1", "stamp-a").unwrap();
        assert!(!codec.verify(&token, "u-1", "stamp-a"));
        assert!(!codec.verify("not-a-token", "u-1", "stamp-a"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = ResetTokenCodec::new(SECRET);
        let past = OffsetDateTime::now_utc() - time::Duration::hours(48);
        let claims = ResetClaims {
            sub: "u-1".into(),
            stamp: "stamp-a".into(),
            purpose: RESET_TOKEN_PURPOSE.into(),
            iat: past.unix_timestamp() as usize,
            exp: (past + RESET_TOKEN_LIFETIME).unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &codec.encoding).unwrap();
        assert!(!codec.verify(&token, "u-1", "stamp-a"));
    }
}
