//! Access-token signing and validation (HS256).

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::OAuth2Config;

/// Claims carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    /// User id for the password grant, client id for client credentials.
    pub sub: String,
    pub client_id: String,
    /// Space-separated granted scopes.
    pub scope: String,
    pub iat: usize,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Who a token is issued to, before timestamps and issuer are filled in.
#[derive(Debug, Clone, Default)]
pub struct TokenSubject {
    pub sub: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

pub struct TokenIssuer {
    issuer: String,
    lifetime: i64,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenIssuer {
    pub fn new(config: &OAuth2Config) -> Self {
        Self {
            issuer: config.issuer_url.clone(),
            lifetime: config.access_token_lifetime,
            encoding: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.signing_secret.as_bytes()),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Token lifetime in seconds.
    pub fn lifetime(&self) -> i64 {
        self.lifetime
    }

    pub fn issue(&self, subject: TokenSubject) -> Result<String, jsonwebtoken::errors::Error> {
        let now = OffsetDateTime::now_utc();
        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: subject.sub,
            client_id: subject.client_id,
            scope: subject.scopes.join(" "),
            iat: now.unix_timestamp() as usize,
            exp: (now + time::Duration::seconds(self.lifetime)).unix_timestamp() as usize,
            email: subject.email,
            name: subject.name,
            role: subject.role,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Checks signature, expiry and issuer.
    pub fn validate(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        decode::<AccessClaims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
