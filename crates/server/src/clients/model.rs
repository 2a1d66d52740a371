use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const GRANT_PASSWORD: &str = "password";
pub const SUPPORTED_GRANT_TYPES: [&str; 2] = [GRANT_CLIENT_CREDENTIALS, GRANT_PASSWORD];

fn default_enabled() -> bool {
    true
}

/// External representation of a registered relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClientModel {
    /// Unique client identifier, the lookup key.
    pub client_id: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub allowed_grant_types: Vec<String>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Plaintext secrets. Write-only: hashed on the way in, never echoed back.
    #[serde(default, skip_serializing)]
    pub client_secrets: Vec<String>,
    /// Hashes of the stored secrets, filled in by the repository on reads.
    #[serde(skip)]
    pub secret_hashes: Vec<String>,
}

impl ClientModel {
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            allowed_grant_types: vec![GRANT_CLIENT_CREDENTIALS.to_string()],
            allowed_scopes: Vec::new(),
            enabled: true,
            client_secrets: Vec::new(),
            secret_hashes: Vec::new(),
        }
    }

    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.allowed_grant_types.iter().any(|g| g == grant_type)
    }

    /// One message per invalid field.
    pub fn validate(&self, require_secret: bool) -> Vec<String> {
        let mut errors = Vec::new();
        if self.client_id.trim().is_empty() {
            errors.push("client_id is required".to_string());
        } else if self.client_id.chars().any(char::is_whitespace) {
            errors.push("client_id must not contain whitespace".to_string());
        }
        if self.allowed_grant_types.is_empty() {
            errors.push("allowed_grant_types must not be empty".to_string());
        }
        for grant in &self.allowed_grant_types {
            if !SUPPORTED_GRANT_TYPES.contains(&grant.as_str()) {
                errors.push(format!("unsupported grant type '{grant}'"));
            }
        }
        if self
            .allowed_scopes
            .iter()
            .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
        {
            errors.push("allowed_scopes entries must be non-empty and contain no whitespace".to_string());
        }
        if require_secret && self.client_secrets.iter().all(|s| s.is_empty()) {
            errors.push("client_secrets must contain at least one secret".to_string());
        }
        errors
    }
}
