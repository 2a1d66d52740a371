use thiserror::Error;

use crate::mailer::MailError;

/// Failure of the persistence layer itself, as opposed to a refused operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Token signing failed: {0}")]
    Token(String),
    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(String),
    /// Input failed validation. Carries one message per offending field.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The identity store refused the operation (duplicate e-mail, weak password, ...).
    #[error("Operation rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),
    /// The user record exists but its role could not be set.
    #[error("Role assignment failed for user {user_id}: {}", .errors.join("; "))]
    RoleAssignment { user_id: String, errors: Vec<String> },
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The store reported something the workflow has no case for.
    #[error("Unexpected identity store response: {0}")]
    Unexpected(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        UserError::Store(StoreError::Database(err))
    }
}

#[derive(Debug, Error)]
pub enum ClientStoreError {
    /// A required argument was absent. Raised before the store is touched.
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),
    /// The operation is not part of the repository contract.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type ClientStoreResult<T> = Result<T, ClientStoreError>;
