//! The identity store contract consumed by [`crate::users::UserManager`].

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::users::model::{Role, User};

/// One refusal reported by the store. `description` is the human-readable text
/// that callers classify on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    pub code: String,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn duplicate_email(email: &str) -> Self {
        Self::new("DuplicateEmail", format!("Email '{email}' is already taken."))
    }

    pub fn invalid_token() -> Self {
        Self::new("InvalidToken", "Invalid token.")
    }

    pub fn password_mismatch() -> Self {
        Self::new("PasswordMismatch", "Incorrect password.")
    }

    pub fn user_not_found(id: &str) -> Self {
        Self::new("UserNotFound", format!("User '{id}' does not exist."))
    }
}

/// Outcome of a mutating store call: success, or a non-empty list of refusals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityResult {
    pub errors: Vec<IdentityError>,
}

impl IdentityResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(errors: Vec<IdentityError>) -> Self {
        Self { errors }
    }

    pub fn failed_with(error: IdentityError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.description.clone()).collect()
    }
}

/// Persistence of users, credentials and role memberships.
///
/// Refusals (duplicate e-mail, weak password, bad token) come back as a failed
/// [`IdentityResult`]. `Err` is reserved for the store itself breaking.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn all_users(&self) -> StoreResult<Vec<User>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Persists `user` with a hash of `password`. The password hash and
    /// security stamp carried by `user` are ignored.
    async fn create(&self, user: &User, password: &str) -> StoreResult<IdentityResult>;

    /// Overwrites profile fields, e-mail, lockout flag and status. Credentials
    /// and roles are untouched.
    async fn update(&self, user: &User) -> StoreResult<IdentityResult>;

    async fn delete(&self, user_id: &str) -> StoreResult<IdentityResult>;

    async fn roles_of(&self, user_id: &str) -> StoreResult<Vec<Role>>;

    async fn add_to_role(&self, user_id: &str, role: Role) -> StoreResult<IdentityResult>;

    async fn remove_from_roles(&self, user_id: &str, roles: &[Role])
    -> StoreResult<IdentityResult>;

    async fn generate_password_reset_token(&self, user: &User) -> StoreResult<String>;

    async fn reset_password(
        &self,
        user: &User,
        token: &str,
        new_password: &str,
    ) -> StoreResult<IdentityResult>;

    async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> StoreResult<IdentityResult>;

    async fn check_password(&self, user: &User, password: &str) -> StoreResult<bool>;
}
