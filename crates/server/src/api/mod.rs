//! API module providing the HTTP surface of the identity provider.
//!
//! This module is organized into submodules:
//! - `users` - User management and account lifecycle (/api/v1/users/*)
//! - `clients` - Client registry (/api/clients/*)
//! - `contact` - Contact form (/api/v1/contact)
//! - `health` - Liveness endpoint (/healthz)
//! - `auth` - Bearer-token extractor
//! - `error` - JSON error body
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! The token endpoint and discovery document live in [`crate::oauth2`].

pub mod auth;
pub mod clients;
pub mod contact;
pub mod error;
pub mod health;
pub mod openapi;
pub mod users;

pub use error::ApiError;
pub use health::SERVICE_TAG;

use crate::AppResources;
use axum::http::HeaderValue;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        tracing::warn!("cors_allowed_origins is empty, allowing any origin");
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

/// Builds the complete application router, including the Redoc UI at `/api-docs`.
pub fn app(app_resources: AppResources) -> axum::Router {
    let cors = cors_layer(&app_resources.config.cors_allowed_origins);

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/v1/users", users::router())
        .nest("/api/v1/contact", contact::router())
        .nest("/api/clients", clients::router())
        .merge(crate::oauth2::router())
        .routes(routes!(health::liveness))
        // Attach application resources, CORS and the standard TraceLayer.
        .layer(axum::Extension(app_resources))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(app_resources))]
pub async fn start_webserver(app_resources: AppResources) -> color_eyre::Result<()> {
    let addr = app_resources.config.listen_addr.clone();
    let router = app(app_resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
