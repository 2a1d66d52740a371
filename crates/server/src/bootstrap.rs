//! Startup provisioning of the first client and the first administrator.

use thiserror::Error;

use crate::AppResources;
use crate::clients::ClientModel;
use crate::clients::model::GRANT_CLIENT_CREDENTIALS;
use crate::config::{AdminBootstrapConfig, InitialClientConfig};
use crate::error::{ClientStoreError, UserError};
use crate::users::{Role, UserDto, UserStatus};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Failed to provision initial client: {0}")]
    Client(#[from] ClientStoreError),
    #[error("Failed to provision administrator: {0}")]
    Admin(#[from] UserError),
}

/// What [`run`] created. Existing records are left untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub client_created: bool,
    pub admin_created: bool,
}

/// Creates the configured client and administrator if they do not exist yet.
#[tracing::instrument(skip(resources))]
pub async fn run(resources: &AppResources) -> Result<BootstrapReport, BootstrapError> {
    let mut report = BootstrapReport::default();
    let bootstrap = &resources.config.bootstrap;

    if let Some(client) = &bootstrap.initial_client {
        report.client_created = ensure_client(resources, client).await?;
    }
    if let Some(admin) = &bootstrap.admin {
        report.admin_created = ensure_admin(resources, admin).await?;
    }
    Ok(report)
}

async fn ensure_client(
    resources: &AppResources,
    config: &InitialClientConfig,
) -> Result<bool, BootstrapError> {
    if resources
        .clients
        .get_by_client_id(&config.client_id)
        .await?
        .is_some()
    {
        tracing::debug!(client_id = %config.client_id, "Initial client already present");
        return Ok(false);
    }

    let mut client = ClientModel::new(&config.client_id, &config.client_name);
    client.allowed_grant_types = vec![GRANT_CLIENT_CREDENTIALS.to_string()];
    client.allowed_scopes = config.scopes.clone();
    client.client_secrets = vec![config.client_secret.clone()];
    resources.clients.create(Some(&client)).await?;

    tracing::info!(client_id = %config.client_id, "Initial client created");
    Ok(true)
}

async fn ensure_admin(
    resources: &AppResources,
    config: &AdminBootstrapConfig,
) -> Result<bool, BootstrapError> {
    if resources.users.find_by_email(&config.email).await?.is_some() {
        tracing::debug!("Administrator already present");
        return Ok(false);
    }

    let admin = UserDto {
        email: config.email.clone(),
        given_name: config.given_name.clone(),
        family_name: if config.family_name.trim().is_empty() {
            // Family name is mandatory on every account.
            "Account".to_string()
        } else {
            config.family_name.clone()
        },
        status: Some(UserStatus::Active),
        lockout_enabled: false,
        role: Some(Role::Administrator.id().to_string()),
        password: Some(config.password.clone()),
        ..UserDto::default()
    };
    let created = resources.users.create(&admin).await?;

    tracing::info!(user_id = ?created.id, "Administrator created");
    Ok(true)
}
