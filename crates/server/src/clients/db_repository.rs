use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use time::OffsetDateTime;

use crate::clients::model::ClientModel;
use crate::clients::repository::ClientRepository;
use crate::clients::secret::hash_secret;
use crate::entity::{oauth2_client, oauth2_client_secret};
use crate::error::{ClientStoreError, ClientStoreResult};

/// [`ClientRepository`] over the `oauth2_client` and `oauth2_client_secret` tables.
pub struct DbClientRepository {
    db: Arc<DatabaseConnection>,
}

impl DbClientRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_row(&self, client_id: &str) -> ClientStoreResult<Option<oauth2_client::Model>> {
        Ok(oauth2_client::Entity::find()
            .filter(oauth2_client::Column::ClientId.eq(client_id))
            .one(self.db.as_ref())
            .await?)
    }
}

fn to_model(row: oauth2_client::Model, secret_hashes: Vec<String>) -> ClientModel {
    ClientModel {
        allowed_grant_types: row.grant_types_list(),
        allowed_scopes: row.scopes_list(),
        client_id: row.client_id,
        client_name: row.client_name,
        enabled: row.enabled,
        client_secrets: Vec::new(),
        secret_hashes,
    }
}

async fn insert_secrets<C: ConnectionTrait>(
    conn: &C,
    client_id: &str,
    secrets: &[String],
) -> ClientStoreResult<()> {
    let now = OffsetDateTime::now_utc();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        oauth2_client_secret::ActiveModel {
            client_id: Set(client_id.to_string()),
            value: Set(hash_secret(secret)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ClientRepository for DbClientRepository {
    async fn get_all(&self) -> ClientStoreResult<Vec<ClientModel>> {
        let rows = oauth2_client::Entity::find()
            .order_by_asc(oauth2_client::Column::ClientId)
            .all(self.db.as_ref())
            .await?;
        let mut secrets: HashMap<String, Vec<String>> = HashMap::new();
        for secret in oauth2_client_secret::Entity::find()
            .all(self.db.as_ref())
            .await?
        {
            secrets.entry(secret.client_id).or_default().push(secret.value);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                let hashes = secrets.remove(&row.client_id).unwrap_or_default();
                to_model(row, hashes)
            })
            .collect())
    }

    async fn get_by_client_id(&self, client_id: &str) -> ClientStoreResult<Option<ClientModel>> {
        let Some(row) = self.find_row(client_id).await? else {
            return Ok(None);
        };
        let hashes = oauth2_client_secret::Entity::find()
            .filter(oauth2_client_secret::Column::ClientId.eq(client_id))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|s| s.value)
            .collect();
        Ok(Some(to_model(row, hashes)))
    }

    async fn get_by_id(&self, _id: i32) -> ClientStoreResult<Option<ClientModel>> {
        Err(ClientStoreError::Unsupported("get_by_id"))
    }

    #[tracing::instrument(skip(self, model), fields(client_id = ?model.map(|m| &m.client_id)))]
    async fn create(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let model = model.ok_or(ClientStoreError::MissingArgument("model"))?;
        let now = OffsetDateTime::now_utc();

        let txn = self.db.begin().await?;
        oauth2_client::ActiveModel {
            client_id: Set(model.client_id.clone()),
            client_name: Set(model.client_name.clone()),
            grant_types: Set(model.allowed_grant_types.join(" ")),
            scopes: Set(model.allowed_scopes.join(" ")),
            enabled: Set(model.enabled),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        insert_secrets(&txn, &model.client_id, &model.client_secrets).await?;
        txn.commit().await?;

        tracing::info!("Client created");
        Ok(1)
    }

    #[tracing::instrument(skip(self, model), fields(client_id = ?model.map(|m| &m.client_id)))]
    async fn update(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let model = model.ok_or(ClientStoreError::MissingArgument("model"))?;
        let Some(row) = self.find_row(&model.client_id).await? else {
            return Ok(0);
        };

        let txn = self.db.begin().await?;
        let mut active: oauth2_client::ActiveModel = row.into();
        active.client_name = Set(model.client_name.clone());
        active.grant_types = Set(model.allowed_grant_types.join(" "));
        active.scopes = Set(model.allowed_scopes.join(" "));
        active.enabled = Set(model.enabled);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(&txn).await?;

        if model.client_secrets.iter().any(|s| !s.is_empty()) {
            oauth2_client_secret::Entity::delete_many()
                .filter(oauth2_client_secret::Column::ClientId.eq(model.client_id.as_str()))
                .exec(&txn)
                .await?;
            insert_secrets(&txn, &model.client_id, &model.client_secrets).await?;
        }
        txn.commit().await?;
        Ok(1)
    }

    #[tracing::instrument(skip(self, model), fields(client_id = ?model.map(|m| &m.client_id)))]
    async fn delete(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let model = model.ok_or(ClientStoreError::MissingArgument("model"))?;
        let Some(row) = self.find_row(&model.client_id).await? else {
            return Ok(0);
        };

        let txn = self.db.begin().await?;
        oauth2_client_secret::Entity::delete_many()
            .filter(oauth2_client_secret::Column::ClientId.eq(row.client_id.as_str()))
            .exec(&txn)
            .await?;
        let deleted = oauth2_client::Entity::delete_by_id(row.id)
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(deleted.rows_affected)
    }

    async fn delete_by_id(&self, _id: i32) -> ClientStoreResult<u64> {
        Err(ClientStoreError::Unsupported("delete_by_id"))
    }
}
