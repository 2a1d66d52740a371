//! OAuth2 token issuance.
//!
//! Registered clients obtain HS256-signed bearer tokens from the token
//! endpoint. The same tokens authenticate callers of the management API.
//!
//! ## Supported Flows
//!
//! - Client Credentials
//! - Resource Owner Password
//!
//! ## Endpoints
//!
//! - `POST /connect/token` - Token endpoint
//! - `GET /.well-known/openid-configuration` - Discovery document

pub mod endpoints;
pub mod jwt;

pub use endpoints::router;
pub use jwt::{AccessClaims, TokenIssuer, TokenSubject};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
