//! OpenAPI/Utoipa configuration.

use crate::api::health::SERVICE_TAG;
use crate::clients::CLIENTS_TAG;
use crate::oauth2::OAUTH2_TAG;
use crate::users::USERS_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ClientCredentials, Flow, HttpAuthScheme, HttpBuilder, OAuth2, Password, Scopes, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Access token obtained from `/connect/token`. Administrative endpoints need the Administrator role.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([
                Flow::ClientCredentials(ClientCredentials::new(
                    "/connect/token",
                    Scopes::new(),
                )),
                Flow::Password(Password::new("/connect/token", Scopes::new())),
            ]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Identity Provider API",
        version = "1.0.0",
        description = "User accounts, approval workflow, client registry and token issuance."
    ),
    tags(
        (name = SERVICE_TAG, description = "Liveness and the public contact form"),
        (name = USERS_TAG, description = "User management and account lifecycle"),
        (name = CLIENTS_TAG, description = "Registered OAuth2 clients"),
        (name = OAUTH2_TAG, description = "Token issuance")
    )
)]
pub struct ApiDoc;
