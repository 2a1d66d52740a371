//! SeaORM entities.

pub mod app_user;
pub mod oauth2_client;
pub mod oauth2_client_secret;
pub mod role;
pub mod user_role;
