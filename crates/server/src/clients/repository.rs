use async_trait::async_trait;

use crate::clients::model::ClientModel;
use crate::error::ClientStoreResult;

/// Persistence of registered clients, keyed by `client_id`.
///
/// Writes take an optional model; `None` fails with
/// [`ClientStoreError::MissingArgument`](crate::error::ClientStoreError::MissingArgument)
/// before the store is touched. Updating or deleting an unknown client is not an
/// error and affects 0 rows.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn get_all(&self) -> ClientStoreResult<Vec<ClientModel>>;

    /// `None` when no client has this id.
    async fn get_by_client_id(&self, client_id: &str) -> ClientStoreResult<Option<ClientModel>>;

    /// Not supported: clients are never addressed by their surrogate key.
    async fn get_by_id(&self, id: i32) -> ClientStoreResult<Option<ClientModel>>;

    /// Always inserts. Callers check for an existing `client_id` first.
    async fn create(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64>;

    /// Copies name, grant types, scopes and enabled flag. Secrets are replaced
    /// only when the model carries any.
    async fn update(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64>;

    async fn delete(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64>;

    /// Not supported, see [`ClientRepository::get_by_id`].
    async fn delete_by_id(&self, id: i32) -> ClientStoreResult<u64>;
}
