//! User accounts: domain model, identity store and the lifecycle workflow.

pub mod db_store;
pub mod manager;
pub mod model;
pub mod password;
pub mod reset_token;
pub mod store;

pub use db_store::DbUserStore;
pub use manager::{PasswordChangeOutcome, PasswordResetOutcome, UserManager};
pub use model::{Role, User, UserDto, UserStatus};
pub use store::{IdentityError, IdentityResult, UserStore};

/// OpenAPI tag for user endpoints
pub const USERS_TAG: &str = "Users";
