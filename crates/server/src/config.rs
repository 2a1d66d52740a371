use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Public identity of the deployment, interpolated into every outgoing e-mail.
#[derive(Clone, Debug, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Base URL of the frontend, used to build links (reset password, sign in).
    pub url: String,
    /// Recipient of messages submitted through the contact form.
    pub contact_email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Issuer (`iss`) of every token and the authority bearer tokens are checked against.
    pub issuer_url: String,
    /// HS256 key for access tokens and password-reset tokens.
    pub signing_secret: String,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_client_cache_ttl")]
    pub client_cache_ttl_secs: u64,
}

fn default_access_token_lifetime() -> i64 {
    3600
}

fn default_client_cache_ttl() -> u64 {
    300
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub required_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            required_length: 6,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl PasswordPolicy {
    /// A policy that accepts any non-empty password.
    pub fn relaxed() -> Self {
        Self {
            required_length: 1,
            require_digit: false,
            require_lowercase: false,
            require_uppercase: false,
            require_non_alphanumeric: false,
        }
    }
}

/// Client created on startup when no client with `client_id` exists yet.
#[derive(Clone, Debug, Deserialize)]
pub struct InitialClientConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_initial_client_name")]
    pub client_name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_initial_client_name() -> String {
    "Initial client".to_string()
}

/// Administrator account created on startup when its e-mail is unknown.
#[derive(Clone, Debug, Deserialize)]
pub struct AdminBootstrapConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_given_name")]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
}

fn default_admin_given_name() -> String {
    "Administrator".to_string()
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BootstrapConfig {
    pub initial_client: Option<InitialClientConfig>,
    pub admin: Option<AdminBootstrapConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub site: SiteConfig,
    /// When absent, outgoing mail is written to the log instead of being sent.
    pub smtp: Option<SmtpConfig>,
    pub oauth2: OAuth2Config,
    /// Origins allowed to call the API from a browser. Empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    #[serde(default)]
    pub password_policy: PasswordPolicy,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl AppConfig {
    /// Checks the invariants `serde` cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth2.signing_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "oauth2.signing_secret must be at least 32 characters".into(),
            ));
        }
        if self.oauth2.issuer_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "oauth2.issuer_url must not be empty".into(),
            ));
        }
        if self.oauth2.access_token_lifetime <= 0 {
            return Err(ConfigError::Validation(
                "oauth2.access_token_lifetime must be > 0".into(),
            ));
        }
        if self.site.url.trim().is_empty() {
            return Err(ConfigError::Validation("site.url must not be empty".into()));
        }
        if let Some(smtp) = &self.smtp
            && smtp.port == 0
        {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        if self.password_policy.required_length == 0 {
            return Err(ConfigError::Validation(
                "password_policy.required_length must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double underscores
/// (e.g. `OAUTH2__SIGNING_SECRET`) overrides the file value. A `.env` file in the
/// working directory is loaded first when present.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};

    let _ = dotenvy::dotenv();

    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Like [`load_config`], but panics with the error instead of returning it.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    const MINIMAL: &str = r#"
database_url: "sqlite::memory:"
site:
  name: "Field Reports"
  url: "https://reports.example.org"
  contact_email: "help@example.org"
oauth2:
  issuer_url: "https://id.example.org"
  signing_secret: "0123456789abcdef0123456789abcdef"
"#;

    fn parse(yaml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = parse(MINIMAL);
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.oauth2.access_token_lifetime, 3600);
        assert_eq!(cfg.oauth2.client_cache_ttl_secs, 300);
        assert!(cfg.smtp.is_none());
        assert!(cfg.cors_allowed_origins.is_empty());
        assert_eq!(cfg.password_policy.required_length, 6);
        assert!(cfg.bootstrap.initial_client.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn short_signing_secret_is_rejected() {
        let mut cfg = parse(MINIMAL);
        cfg.oauth2.signing_secret = "short".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_smtp_port_is_rejected() {
        let yaml = format!(
            "{MINIMAL}smtp:\n  server: \"localhost\"\n  port: 0\n  username: \"u\"\n  password: \"p\"\n  from: \"noreply@example.org\"\n"
        );
        let cfg = parse(&yaml);
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn bootstrap_section_parses() {
        let yaml = format!(
            "{MINIMAL}bootstrap:\n  initial_client:\n    client_id: \"reporting-service\"\n    client_secret: \"s3cret\"\n    scopes: [\"reports\"]\n"
        );
        let cfg = parse(&yaml);
        let client = cfg.bootstrap.initial_client.unwrap();
        assert_eq!(client.client_id, "reporting-service");
        assert_eq!(client.client_name, "Initial client");
        assert_eq!(client.scopes, vec!["reports".to_string()]);
    }
}
