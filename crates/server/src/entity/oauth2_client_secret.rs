//! Hashed client secret. A client may hold several at once (rotation).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_client_secret")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// References `oauth2_client.client_id`
    pub client_id: String,
    /// Base64 SHA-256 of the plaintext secret
    pub value: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oauth2_client::Entity",
        from = "Column::ClientId",
        to = "super::oauth2_client::Column::ClientId"
    )]
    Client,
}

impl Related<super::oauth2_client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
