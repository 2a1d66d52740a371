//! An identity provider: user accounts with an approval workflow, a registry
//! of OAuth2 clients and a token endpoint issuing signed bearer tokens.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::clients::{CachingClientRepository, ClientRepository, DbClientRepository};
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::oauth2::TokenIssuer;
use crate::users::{DbUserStore, UserManager, UserStore};

pub mod api;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod email_templates;
pub mod entity;
pub mod error;
pub mod mailer;
pub mod oauth2;
pub mod users;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub users: Arc<UserManager>,
    pub clients: Arc<dyn ClientRepository>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppResources {
    /// Wires the database-backed stores, the client cache and the token issuer.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let store: Arc<dyn UserStore> = Arc::new(DbUserStore::new(
            db.clone(),
            config.password_policy.clone(),
            &config.oauth2.signing_secret,
        ));
        Self::with_stores(
            db.clone(),
            config,
            store,
            Arc::new(DbClientRepository::new(db)),
            mailer,
        )
    }

    /// Same as [`AppResources::new`] with caller-supplied stores.
    pub fn with_stores(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        user_store: Arc<dyn UserStore>,
        client_repository: Arc<dyn ClientRepository>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let users = Arc::new(UserManager::new(user_store, mailer, config.site.clone()));
        let clients: Arc<dyn ClientRepository> = Arc::new(CachingClientRepository::new(
            client_repository,
            Duration::from_secs(config.oauth2.client_cache_ttl_secs),
        ));
        let tokens = Arc::new(TokenIssuer::new(&config.oauth2));
        Self {
            db,
            config,
            users,
            clients,
            tokens,
        }
    }
}
