//! Registered OAuth2 clients: persistence, caching and secret handling.

pub mod cache;
pub mod db_repository;
pub mod model;
pub mod repository;
pub mod secret;

pub use cache::CachingClientRepository;
pub use db_repository::DbClientRepository;
pub use model::ClientModel;
pub use repository::ClientRepository;

/// OpenAPI tag for client management endpoints
pub const CLIENTS_TAG: &str = "Clients";
