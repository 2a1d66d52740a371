//! Client registry API endpoints (administrators only).
//!
//! - `GET /` - List clients
//! - `POST /` - Register a client
//! - `GET /{client_id}` - Fetch a client
//! - `PUT /{client_id}` - Update a client
//! - `DELETE /{client_id}` - Remove a client

use crate::AppResources;
use crate::api::auth::Caller;
use crate::api::error::ApiError;
use crate::clients::{CLIENTS_TAG, ClientModel};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the clients API router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_clients, create_client))
        .routes(routes!(get_client, update_client, delete_client))
}

/// List registered clients.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "",
    tag = CLIENTS_TAG,
    operation_id = "List Clients",
    summary = "List registered clients",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "All clients. Secrets are never returned.", body = Vec<ClientModel>),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
    )
)]
async fn list_clients(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
) -> Result<Json<Vec<ClientModel>>, ApiError> {
    caller.require_admin()?;
    Ok(Json(resources.clients.get_all().await?))
}

/// Fetch a client by its client id.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "/{client_id}",
    tag = CLIENTS_TAG,
    operation_id = "Get Client",
    summary = "Fetch a client",
    security(("Authorization" = [])),
    params(("client_id" = String, Path, description = "Client identifier")),
    responses(
        (status = 200, description = "The client", body = ClientModel),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "Client not found", body = ApiError),
    )
)]
async fn get_client(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(client_id): Path<String>,
) -> Result<Json<ClientModel>, ApiError> {
    caller.require_admin()?;
    resources
        .clients
        .get_by_client_id(&client_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Client '{client_id}' not found")))
}

/// Register a client.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject))]
#[utoipa::path(
    post,
    path = "",
    tag = CLIENTS_TAG,
    operation_id = "Create Client",
    summary = "Register a client",
    description = "Registers a relying party. `client_secrets` are plaintext on input and are stored hashed.",
    security(("Authorization" = [])),
    request_body(content = ClientModel, description = "Client to register"),
    responses(
        (status = 201, description = "Client registered", body = ClientModel),
        (status = 400, description = "Missing body or invalid fields", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 409, description = "A client with this id already exists", body = ApiError),
    )
)]
async fn create_client(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    payload: Option<Json<ClientModel>>,
) -> Result<(StatusCode, Json<ClientModel>), ApiError> {
    caller.require_admin()?;
    let model = payload.map(|Json(m)| m);
    if let Some(model) = &model {
        let errors = model.validate(true);
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }
        if resources
            .clients
            .get_by_client_id(&model.client_id)
            .await?
            .is_some()
        {
            return Err(ApiError::conflict(format!(
                "Client '{}' already exists",
                model.client_id
            )));
        }
    }
    // A missing body is refused by the repository with MissingArgument (400).
    resources.clients.create(model.as_ref()).await?;
    let Some(mut created) = model else {
        return Err(ApiError::bad_request("Missing model"));
    };
    created.client_secrets.clear();
    tracing::info!(client_id = %created.client_id, "Client registered");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a client.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject))]
#[utoipa::path(
    put,
    path = "/{client_id}",
    tag = CLIENTS_TAG,
    operation_id = "Update Client",
    summary = "Update a client",
    description = "Replaces name, grant types, scopes and enabled flag. Secrets are replaced only when \
                   `client_secrets` is non-empty.",
    security(("Authorization" = [])),
    params(("client_id" = String, Path, description = "Client identifier")),
    request_body(content = ClientModel, description = "New client settings"),
    responses(
        (status = 204, description = "Client updated"),
        (status = 400, description = "Missing body or invalid fields", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "Client not found", body = ApiError),
    )
)]
async fn update_client(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(client_id): Path<String>,
    payload: Option<Json<ClientModel>>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    let mut model = payload.map(|Json(m)| m);
    if let Some(model) = &mut model {
        if model.client_id.is_empty() {
            model.client_id = client_id.clone();
        } else if model.client_id != client_id {
            return Err(ApiError::bad_request("Body client_id does not match the path"));
        }
        let errors = model.validate(false);
        if !errors.is_empty() {
            return Err(ApiError::validation(errors));
        }
    }
    match resources.clients.update(model.as_ref()).await? {
        0 => Err(ApiError::not_found(format!("Client '{client_id}' not found"))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

/// Remove a client and its secrets.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    delete,
    path = "/{client_id}",
    tag = CLIENTS_TAG,
    operation_id = "Delete Client",
    summary = "Delete a client",
    security(("Authorization" = [])),
    params(("client_id" = String, Path, description = "Client identifier")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "Client not found", body = ApiError),
    )
)]
async fn delete_client(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(client_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    let key = ClientModel::new(client_id.clone(), "");
    match resources.clients.delete(Some(&key)).await? {
        0 => Err(ApiError::not_found(format!("Client '{client_id}' not found"))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}
