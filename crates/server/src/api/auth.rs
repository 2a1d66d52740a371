//! Bearer-token authentication for the management API.
//!
//! Tokens are the JWTs issued by `/connect/token`; they are checked for
//! signature, expiry and issuer without touching the database.

use crate::AppResources;
use crate::api::error::ApiError;
use crate::users::Role;
use axum::{extract::FromRequestParts, http::request::Parts};

/// The authenticated caller behind a request.
#[derive(Debug, Clone)]
pub struct Caller {
    /// User id, or the client id for client-credentials tokens
    pub subject: String,
    /// Client the token was issued to
    pub client_id: String,
    pub email: Option<String>,
    pub role: Option<Role>,
    /// Scopes granted by the token
    pub scopes: Vec<String>,
}

impl Caller {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Administrator)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator role required"))
        }
    }

    /// Users may act on their own account; administrators on any.
    pub fn require_self_or_admin(&self, user_id: &str) -> Result<(), ApiError> {
        if self.is_admin() || self.subject == user_id {
            Ok(())
        } else {
            tracing::warn!(
                caller = %self.subject,
                target_user = %user_id,
                "Refused access to another user's account"
            );
            Err(ApiError::forbidden("You may only access your own account"))
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                ApiError::server_error()
            })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        let access_token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => &header[7..],
            Some(_) => {
                return Err(ApiError::invalid_token(
                    "Authorization header must use Bearer scheme",
                ));
            }
            None => {
                return Err(ApiError::invalid_token("Missing Authorization header"));
            }
        };

        let claims = resources.tokens.validate(access_token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::invalid_token("Token is not valid")
        })?;

        Ok(Caller {
            role: claims.role.as_deref().and_then(|r| r.parse().ok()),
            scopes: claims.scope.split_whitespace().map(String::from).collect(),
            subject: claims.sub,
            client_id: claims.client_id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Option<Role>) -> Caller {
        Caller {
            subject: "user-123".to_string(),
            client_id: "web".to_string(),
            email: Some("test@example.com".to_string()),
            role,
            scopes: vec!["reports".to_string()],
        }
    }

    #[test]
    fn admin_may_act_on_anyone() {
        let admin = caller(Some(Role::Administrator));
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_self_or_admin("someone-else").is_ok());
    }

    #[test]
    fn non_admin_is_limited_to_self() {
        let reporter = caller(Some(Role::Reporter));
        assert!(reporter.require_admin().is_err());
        assert!(reporter.require_self_or_admin("user-123").is_ok());
        assert!(reporter.require_self_or_admin("someone-else").is_err());
        assert!(reporter.has_scope("reports"));
        assert!(!reporter.has_scope("admin"));
    }
}
