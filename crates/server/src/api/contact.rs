//! Public contact form.

use crate::AppResources;
use crate::api::error::ApiError;
use crate::api::health::SERVICE_TAG;
use crate::users::model::ContactRequest;
use axum::{Extension, Json, http::StatusCode};
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(send_contact_message))
}

/// Forward a message to the site's contact address.
#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "",
    tag = SERVICE_TAG,
    operation_id = "Contact",
    summary = "Send a message to the site operators",
    request_body(content = ContactRequest, description = "Sender and message"),
    responses(
        (status = 202, description = "Message forwarded"),
        (status = 400, description = "Invalid fields", body = ApiError),
    )
)]
async fn send_contact_message(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<ContactRequest>,
) -> Result<StatusCode, ApiError> {
    resources.users.send_contact_message(&payload).await?;
    Ok(StatusCode::ACCEPTED)
}
