//! Shared fixtures for the integration tests: an in-memory SQLite schema,
//! a mailer that records instead of sending, and token helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use identity_provider::AppResources;
use identity_provider::config::{
    AppConfig, BootstrapConfig, OAuth2Config, PasswordPolicy, SiteConfig,
};
use identity_provider::mailer::{MailError, Mailer, OutgoingEmail};
use identity_provider::oauth2::TokenSubject;
use identity_provider::users::Role;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const ISSUER: &str = "http://localhost:8080";
pub const SITE_URL: &str = "https://reports.example.org";

const SCHEMA: [&str; 5] = [
    r#"CREATE TABLE app_user (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        given_name TEXT NOT NULL,
        family_name TEXT NOT NULL,
        phone_number TEXT NULL,
        secondary_phone_number TEXT NULL,
        address_line1 TEXT NULL,
        address_line2 TEXT NULL,
        city TEXT NULL,
        state_province TEXT NULL,
        postal_code TEXT NULL,
        lockout_enabled INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        password_hash TEXT NOT NULL,
        security_stamp TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE role (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );"#,
    r#"CREATE TABLE user_role (
        user_id TEXT NOT NULL REFERENCES app_user(id),
        role_id INTEGER NOT NULL REFERENCES role(id),
        PRIMARY KEY (user_id, role_id)
    );"#,
    r#"CREATE TABLE oauth2_client (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id TEXT NOT NULL UNIQUE,
        client_name TEXT NOT NULL,
        grant_types TEXT NOT NULL,
        scopes TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE oauth2_client_secret (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id TEXT NOT NULL REFERENCES oauth2_client(client_id),
        value TEXT NOT NULL,
        created_at TEXT NOT NULL
    );"#,
];

/// Connect to an empty in-memory database without any tables.
pub async fn empty_db() -> Arc<DatabaseConnection> {
    Arc::new(
        Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database"),
    )
}

/// In-memory SQLite database with every table and the four roles.
pub async fn setup_test_db() -> Arc<DatabaseConnection> {
    let db = empty_db().await;
    for ddl in SCHEMA {
        db.execute(Statement::from_string(DbBackend::Sqlite, ddl))
            .await
            .expect("Failed to create table");
    }
    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"INSERT INTO role (id, name) VALUES
            (1, 'Administrator'), (2, 'Reporter'), (3, 'Coordinator'), (4, 'Lead');"#,
    ))
    .await
    .expect("Failed to seed roles");
    db
}

/// Keeps every message for inspection. Can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_from_now_on(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("relay unavailable".into()));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

pub fn test_config(policy: PasswordPolicy) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        site: SiteConfig {
            name: "Field Reports".into(),
            url: SITE_URL.into(),
            contact_email: "help@example.org".into(),
        },
        smtp: None,
        oauth2: OAuth2Config {
            issuer_url: ISSUER.into(),
            signing_secret: SIGNING_SECRET.into(),
            access_token_lifetime: 3600,
            client_cache_ttl_secs: 300,
        },
        cors_allowed_origins: vec![],
        password_policy: policy,
        bootstrap: BootstrapConfig::default(),
    }
}

pub struct TestContext {
    pub resources: AppResources,
    pub mailer: Arc<RecordingMailer>,
}

/// Resources over a fresh database, with the relaxed password policy.
pub async fn test_context() -> TestContext {
    test_context_with(test_config(PasswordPolicy::relaxed())).await
}

pub async fn test_context_with(config: AppConfig) -> TestContext {
    let db = setup_test_db().await;
    let mailer = Arc::new(RecordingMailer::default());
    let resources = AppResources::new(db, Arc::new(config), mailer.clone());
    TestContext { resources, mailer }
}

/// Signs a token the way the token endpoint would for a user with `role`.
pub fn user_token(resources: &AppResources, user_id: &str, role: Role) -> String {
    resources
        .tokens
        .issue(TokenSubject {
            sub: user_id.to_string(),
            client_id: "test-client".to_string(),
            scopes: vec![],
            email: Some(format!("{user_id}@example.org")),
            name: Some("Test User".to_string()),
            role: Some(role.name().to_string()),
        })
        .expect("Failed to sign test token")
}

pub fn admin_token(resources: &AppResources) -> String {
    user_token(resources, "admin-1", Role::Administrator)
}

/// Pulls the `token` query parameter out of a reset e-mail.
pub fn reset_token_from(email: &OutgoingEmail) -> String {
    let start = email
        .text_body
        .find("token=")
        .expect("reset link present")
        + "token=".len();
    let rest = &email.text_body[start..];
    let end = rest.find('&').expect("email parameter follows token");
    urlencoding::decode(&rest[..end])
        .expect("token is valid percent-encoding")
        .into_owned()
}
