//! User management API endpoints.
//!
//! Administrative endpoints require a bearer token with the Administrator
//! role. Registration, the forgotten-password flow and the contact form are
//! anonymous; password change and profile editing are limited to the account
//! owner (or an administrator).

use crate::AppResources;
use crate::api::auth::Caller;
use crate::api::error::ApiError;
use crate::users::model::{
    ApproveRequest, ChangePasswordRequest, ForgotPasswordRequest, ResetPasswordRequest,
    SimpleUserDto, UserProfileDto,
};
use crate::users::{PasswordChangeOutcome, PasswordResetOutcome, USERS_TAG, UserDto};
use axum::{
    Extension, Json,
    extract::{Path, Query},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the users API router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_users, create_user))
        .routes(routes!(list_pending_users))
        .routes(routes!(simple_list))
        .routes(routes!(approve_users))
        .routes(routes!(register))
        .routes(routes!(forgot_password))
        .routes(routes!(reset_password))
        .routes(routes!(get_user, update_user, delete_user))
        .routes(routes!(change_password))
        .routes(routes!(get_profile, update_profile))
}

/// Number of accounts activated by an approval batch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApproveResponse {
    pub approved: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ResetTokenQuery {
    /// Token from the reset link, as received
    pub token: String,
}

/// List all users.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "",
    tag = USERS_TAG,
    operation_id = "List Users",
    summary = "List every user",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<UserDto>),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
    )
)]
async fn list_users(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    caller.require_admin()?;
    let users = resources.users.find_all().await?.collect();
    Ok(Json(users))
}

/// List users awaiting approval.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "/pending",
    tag = USERS_TAG,
    operation_id = "List Pending Users",
    summary = "List self-registered users awaiting approval",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Pending users", body = Vec<UserDto>),
        (status = 401, description = "Missing or invalid token", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
    )
)]
async fn list_pending_users(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    caller.require_admin()?;
    let users = resources.users.find_all_pending().await?.collect();
    Ok(Json(users))
}

/// Id and name of every active user.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "/simplelist",
    tag = USERS_TAG,
    operation_id = "Simple User List",
    summary = "Id and display name of every active user",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Active users", body = Vec<SimpleUserDto>),
        (status = 401, description = "Missing or invalid token", body = ApiError),
    )
)]
async fn simple_list(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
) -> Result<Json<Vec<SimpleUserDto>>, ApiError> {
    Ok(Json(resources.users.simple_list().await?))
}

/// Fetch one user.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "/{id}",
    tag = USERS_TAG,
    operation_id = "Get User",
    summary = "Fetch a user by id",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserDto),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn get_user(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, ApiError> {
    caller.require_admin()?;
    resources
        .users
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User '{id}' not found")))
}

/// Create an account directly.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject, email = %payload.email))]
#[utoipa::path(
    post,
    path = "",
    tag = USERS_TAG,
    operation_id = "Create User",
    summary = "Create a user with a role",
    description = "Creates an account on behalf of someone. Status and lockout are taken from the \
                   request, status defaulting to `active`. `role` is the numeric role id.\n\n\
                   If the account is stored but the role cannot be assigned, the call fails with 500 \
                   and the account remains.",
    security(("Authorization" = [])),
    request_body(content = UserDto, description = "New user, including `password` and `role`"),
    responses(
        (status = 201, description = "User created", body = UserDto),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 422, description = "Rejected by the identity store", body = ApiError),
        (status = 500, description = "Role assignment failed", body = ApiError),
    )
)]
async fn create_user(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Json(payload): Json<UserDto>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    caller.require_admin()?;
    let created = resources.users.create(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a user's fields and role.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject))]
#[utoipa::path(
    put,
    path = "/{id}",
    tag = USERS_TAG,
    operation_id = "Update User",
    summary = "Update a user and replace their role",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body(content = UserDto, description = "Full user record"),
    responses(
        (status = 204, description = "User updated"),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn update_user(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
    Json(mut payload): Json<UserDto>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    if let Some(body_id) = &payload.id
        && *body_id != id
    {
        return Err(ApiError::bad_request("Body id does not match the path"));
    }
    payload.id = Some(id);
    resources.users.update(&payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a user.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = USERS_TAG,
    operation_id = "Delete User",
    summary = "Delete a user",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator role required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn delete_user(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin()?;
    if resources.users.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("User '{id}' not found")))
    }
}

/// Approve pending users.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject, count = payload.ids.len()))]
#[utoipa::path(
    post,
    path = "/approve",
    tag = USERS_TAG,
    operation_id = "Approve Users",
    summary = "Activate and unlock pending users",
    description = "Processes the ids in order. Unknown ids are skipped. Each approved user is e-mailed.\n\n\
                   The first failure aborts the batch; users approved before it stay approved.",
    security(("Authorization" = [])),
    request_body(content = ApproveRequest, description = "Ids to approve"),
    responses(
        (status = 200, description = "Number of users approved", body = ApproveResponse),
        (status = 403, description = "Administrator role required", body = ApiError),
    )
)]
async fn approve_users(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, ApiError> {
    caller.require_admin()?;
    let approved = resources.users.approve(&payload.ids).await?;
    Ok(Json(ApproveResponse { approved }))
}

/// Self-registration.
#[tracing::instrument(skip(resources, payload), fields(email = %payload.email))]
#[utoipa::path(
    post,
    path = "/register",
    tag = USERS_TAG,
    operation_id = "Register",
    summary = "Register an account pending approval",
    description = "Creates a locked, pending Reporter account whatever the request says about role, \
                   status or lockout, and e-mails the applicant.",
    request_body(content = UserDto, description = "Applicant details, including `password`"),
    responses(
        (status = 201, description = "Registration recorded", body = UserDto),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 422, description = "Rejected by the identity store", body = ApiError),
    )
)]
async fn register(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<UserDto>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let created = resources.users.create_pending(&payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Request a password-reset e-mail.
#[tracing::instrument(skip(resources, payload))]
#[utoipa::path(
    post,
    path = "/forgotpassword",
    tag = USERS_TAG,
    operation_id = "Forgot Password",
    summary = "E-mail a password-reset link",
    request_body(content = ForgotPasswordRequest, description = "Account e-mail"),
    responses(
        (status = 202, description = "Reset link sent"),
        (status = 400, description = "Missing e-mail", body = ApiError),
        (status = 404, description = "No account with this e-mail", body = ApiError),
    )
)]
async fn forgot_password(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation(vec!["email is required".to_string()]));
    }
    if resources
        .users
        .request_password_change(&payload.email)
        .await?
    {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::not_found("No account uses this e-mail address"))
    }
}

/// Redeem a password-reset token.
#[tracing::instrument(skip(resources, query, payload), fields(email = %payload.email))]
#[utoipa::path(
    post,
    path = "/resetpassword",
    tag = USERS_TAG,
    operation_id = "Reset Password",
    summary = "Set a new password using a reset token",
    params(ResetTokenQuery),
    request_body(content = ResetPasswordRequest, description = "E-mail and new password"),
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 404, description = "No account with this e-mail", body = ApiError),
        (status = 422, description = "Token invalid, expired or used, or password does not meet the policy", body = ApiError),
    )
)]
async fn reset_password(
    Extension(resources): Extension<AppResources>,
    Query(query): Query<ResetTokenQuery>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    match resources
        .users
        .change_forgotten_password(&query.token, &payload)
        .await?
    {
        PasswordResetOutcome::Happy => Ok(StatusCode::NO_CONTENT),
        PasswordResetOutcome::BadToken => Err(ApiError::unprocessable(
            "The reset link is invalid or has expired",
            vec!["Invalid token.".into()],
        )),
        PasswordResetOutcome::InvalidPassword(errors) => Err(ApiError::unprocessable(
            "Password does not meet the policy",
            errors,
        )),
        PasswordResetOutcome::UserDoesNotExist => {
            Err(ApiError::not_found("No account uses this e-mail address"))
        }
    }
}

/// Change a password knowing the current one.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject))]
#[utoipa::path(
    put,
    path = "/{id}/changepassword",
    tag = USERS_TAG,
    operation_id = "Change Password",
    summary = "Change a password",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body(content = ChangePasswordRequest, description = "Current and new password"),
    responses(
        (status = 204, description = "Password changed"),
        (status = 403, description = "Not your account", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 422, description = "Wrong current password or policy violation", body = ApiError),
    )
)]
async fn change_password(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    caller.require_self_or_admin(&id)?;
    match resources
        .users
        .change_password(&id, &payload.current_password, &payload.new_password)
        .await?
    {
        PasswordChangeOutcome::Changed => Ok(StatusCode::NO_CONTENT),
        PasswordChangeOutcome::IncorrectPassword => Err(ApiError::unprocessable(
            "Current password is incorrect",
            vec!["Incorrect password.".to_string()],
        )),
        PasswordChangeOutcome::InvalidPassword(errors) => Err(ApiError::unprocessable(
            "Password does not meet the policy",
            errors,
        )),
        PasswordChangeOutcome::UserDoesNotExist => {
            Err(ApiError::not_found(format!("User '{id}' not found")))
        }
    }
}

/// Read a user's own profile.
#[tracing::instrument(skip(resources, caller), fields(caller = %caller.subject))]
#[utoipa::path(
    get,
    path = "/{id}/profile",
    tag = USERS_TAG,
    operation_id = "Get Profile",
    summary = "Read a profile",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The profile", body = UserProfileDto),
        (status = 403, description = "Not your account", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn get_profile(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UserProfileDto>, ApiError> {
    caller.require_self_or_admin(&id)?;
    resources
        .users
        .profile(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User '{id}' not found")))
}

/// Edit name, phone and address.
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.subject))]
#[utoipa::path(
    put,
    path = "/{id}/profile",
    tag = USERS_TAG,
    operation_id = "Update Profile",
    summary = "Update a profile",
    description = "Only name, phone and address fields change. E-mail, role, status and lockout are ignored.",
    security(("Authorization" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body(content = UserProfileDto, description = "Profile fields"),
    responses(
        (status = 204, description = "Profile updated"),
        (status = 400, description = "Invalid fields", body = ApiError),
        (status = 403, description = "Not your account", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    )
)]
async fn update_profile(
    Extension(resources): Extension<AppResources>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UserProfileDto>,
) -> Result<StatusCode, ApiError> {
    caller.require_self_or_admin(&id)?;
    if resources.users.update_profile(&id, &payload).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("User '{id}' not found")))
    }
}
