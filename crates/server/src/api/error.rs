//! JSON error body shared by every management endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ClientStoreError, UserError};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code (e.g., "invalid_token", "validation_failed")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// One entry per rejected field or store refusal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ApiError {
    fn new(error: &str, description: Option<String>, errors: Vec<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description,
            errors,
        }
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new("invalid_token", Some(description.into()), Vec::new())
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::new("forbidden", Some(description.into()), Vec::new())
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new("not_found", Some(description.into()), Vec::new())
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::new("bad_request", Some(description.into()), Vec::new())
    }

    pub fn validation(errors: Vec<String>) -> Self {
        Self::new(
            "validation_failed",
            Some("The request contains invalid fields".into()),
            errors,
        )
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::new("conflict", Some(description.into()), Vec::new())
    }

    pub fn unprocessable(description: impl Into<String>, errors: Vec<String>) -> Self {
        Self::new("unprocessable", Some(description.into()), errors)
    }

    pub fn server_error() -> Self {
        Self::new("server_error", None, Vec::new())
    }

    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_failed" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "unprocessable" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => ApiError::not_found(format!("User '{id}' not found")),
            UserError::Validation(errors) => ApiError::validation(errors),
            UserError::Rejected(errors) => {
                ApiError::unprocessable("The identity store rejected the request", errors)
            }
            other => {
                tracing::error!(error = %other, "User operation failed");
                ApiError::server_error()
            }
        }
    }
}

impl From<ClientStoreError> for ApiError {
    fn from(err: ClientStoreError) -> Self {
        match err {
            ClientStoreError::MissingArgument(arg) => {
                ApiError::bad_request(format!("Missing {arg}"))
            }
            ClientStoreError::Unsupported(op) => {
                tracing::error!(operation = op, "Unsupported client repository operation invoked");
                ApiError::server_error()
            }
            ClientStoreError::Database(e) => {
                tracing::error!(error = %e, "Client repository failure");
                ApiError::server_error()
            }
        }
    }
}
