//! Liveness endpoint for orchestrators and load balancers.

/// OpenAPI tag for endpoints that are not tied to users or clients.
pub const SERVICE_TAG: &str = "Service";

/// Reports that the identity provider is accepting requests.
#[tracing::instrument()]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = SERVICE_TAG,
    operation_id = "Liveness",
    summary = "Identity provider liveness",
    description = "Answers `ok` as soon as the router is serving. The database and the mail \
                   transport are not consulted, so a failing SMTP relay does not take the token \
                   endpoint out of rotation.",
    responses(
        (status = 200, description = "Accepting requests", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn liveness() -> &'static str {
    "ok"
}
