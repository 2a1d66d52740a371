//! OAuth2 HTTP endpoints.
//!
//! - `POST /connect/token` - Token endpoint (`client_credentials`, `password`)
//! - `GET /.well-known/openid-configuration` - Discovery document

use crate::AppResources;
use crate::clients::model::{GRANT_PASSWORD, SUPPORTED_GRANT_TYPES};
use crate::clients::secret::verify_secret;
use crate::clients::ClientModel;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::jwt::TokenSubject;
use axum::{
    Extension, Form, Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .routes(routes!(openid_configuration))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Space-separated requested scopes. Defaults to everything the client may use.
    pub scope: Option<String>,
    /// Resource owner e-mail (password grant)
    pub username: Option<String>,
    /// Resource owner password (password grant)
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub token_endpoint: String,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

/// OAuth2 error reply (RFC 6749 section 5.2).
#[derive(Debug)]
pub struct OAuthError {
    status: StatusCode,
    body: ErrorResponse,
}

impl OAuthError {
    fn new(status: StatusCode, error: &str, description: Option<&str>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                error_description: description.map(str::to_string),
            },
        }
    }

    fn invalid_request(description: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", Some(description))
    }

    fn invalid_client() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_client", None)
    }

    fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// Endpoints
// =============================================================================

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(resources, headers, params), fields(grant_type = %params.grant_type))]
#[utoipa::path(
    post,
    path = "/connect/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Issue an access token",
    description = "Issues a signed bearer token to a registered client.\n\n\
                   **Supported grant types:**\n\
                   - `client_credentials`: token for the client itself\n\
                   - `password`: token for an active user, given `username` (e-mail) and `password`\n\n\
                   **Client authentication:** HTTP Basic auth, or `client_id` and `client_secret` in the body.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid request, grant or scope", body = ErrorResponse),
        (status = 401, description = "Invalid client credentials or unknown client", body = ErrorResponse),
    )
)]
pub async fn token(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Response {
    match issue_token(&resources, &headers, params).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::info!(error = %e.body.error, "Token request refused");
            e.into_response()
        }
    }
}

/// OpenID Connect Discovery document.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    tag = OAUTH2_TAG,
    operation_id = "OpenID Connect Discovery",
    summary = "OpenID Connect Discovery document",
    responses(
        (status = 200, description = "Provider metadata", body = OpenIdConfiguration),
    )
)]
pub async fn openid_configuration(
    Extension(resources): Extension<AppResources>,
) -> Json<OpenIdConfiguration> {
    let issuer = resources.tokens.issuer().trim_end_matches('/').to_string();
    Json(OpenIdConfiguration {
        token_endpoint: format!("{issuer}/connect/token"),
        issuer,
        grant_types_supported: SUPPORTED_GRANT_TYPES.iter().map(|g| g.to_string()).collect(),
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
        ],
        claims_supported: ["sub", "email", "name", "role"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

fn extract_client_credentials(
    headers: &HeaderMap,
    params: &TokenRequest,
) -> (Option<String>, Option<String>) {
    // Try Basic auth first
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth)
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
        && let (Some(id), Some(secret)) = (form_decode(id), form_decode(secret))
    {
        return (Some(id), Some(secret));
    }

    // Fall back to form body
    (params.client_id.clone(), params.client_secret.clone())
}

/// Basic credentials are form-urlencoded before base64 (RFC 6749 section 2.3.1).
fn form_decode(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Requested scopes must all be allowed. No request means every allowed scope.
fn resolve_scopes(client: &ClientModel, requested: Option<&str>) -> Result<Vec<String>, OAuthError> {
    let requested: Vec<&str> = requested
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default();
    if requested.is_empty() {
        return Ok(client.allowed_scopes.clone());
    }
    if let Some(unknown) = requested
        .iter()
        .find(|s| !client.allowed_scopes.iter().any(|a| a == *s))
    {
        return Err(OAuthError::new(
            StatusCode::BAD_REQUEST,
            "invalid_scope",
            Some(&format!("Scope '{unknown}' is not allowed for this client")),
        ));
    }
    Ok(requested.into_iter().map(str::to_string).collect())
}

async fn authenticate_client(
    resources: &AppResources,
    headers: &HeaderMap,
    params: &TokenRequest,
) -> Result<ClientModel, OAuthError> {
    let (client_id, client_secret) = extract_client_credentials(headers, params);
    let client_id = client_id.ok_or_else(|| OAuthError::invalid_request("client_id is required"))?;

    let client = match resources.clients.get_by_client_id(&client_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return Err(OAuthError::invalid_client()),
        Err(e) => {
            tracing::error!(error = %e, client_id = %client_id, "Client lookup failed");
            return Err(OAuthError::server_error());
        }
    };
    if !client.enabled {
        return Err(OAuthError::invalid_client());
    }
    match client_secret {
        Some(secret) if verify_secret(&secret, &client.secret_hashes) => Ok(client),
        _ => Err(OAuthError::invalid_client()),
    }
}

async fn issue_token(
    resources: &AppResources,
    headers: &HeaderMap,
    params: TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let grant_type = params.grant_type.as_str();
    if !SUPPORTED_GRANT_TYPES.contains(&grant_type) {
        return Err(OAuthError::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            None,
        ));
    }

    let client = authenticate_client(resources, headers, &params).await?;
    if !client.allows_grant(grant_type) {
        return Err(OAuthError::new(
            StatusCode::BAD_REQUEST,
            "unauthorized_client",
            Some("The client may not use this grant type"),
        ));
    }
    let scopes = resolve_scopes(&client, params.scope.as_deref())?;

    let subject = match grant_type {
        GRANT_PASSWORD => {
            let (Some(username), Some(password)) = (&params.username, &params.password) else {
                return Err(OAuthError::invalid_request(
                    "username and password are required",
                ));
            };
            let user = match resources.users.authenticate(username, password).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    return Err(OAuthError::new(
                        StatusCode::BAD_REQUEST,
                        "invalid_grant",
                        Some("Invalid username or password"),
                    ));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Resource owner authentication failed");
                    return Err(OAuthError::server_error());
                }
            };
            TokenSubject {
                name: Some(user.full_name()),
                role: user.role().map(|r| r.name().to_string()),
                email: Some(user.email),
                sub: user.id,
                client_id: client.client_id.clone(),
                scopes,
            }
        }
        _ => TokenSubject {
            sub: client.client_id.clone(),
            client_id: client.client_id.clone(),
            scopes,
            ..Default::default()
        },
    };

    let scope = subject.scopes.join(" ");
    let access_token = resources.tokens.issue(subject).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign access token");
        OAuthError::server_error()
    })?;
    tracing::info!(client_id = %client.client_id, "Access token issued");
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: resources.tokens.lifetime(),
        scope,
    })
}
