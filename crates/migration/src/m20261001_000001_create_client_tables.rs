//! Registered OAuth2 clients and their hashed secrets.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Client::Table)
                    .if_not_exists()
                    .col(pk_auto(Client::Id))
                    .col(string_uniq(Client::ClientId))
                    .col(string(Client::ClientName).default(""))
                    .col(text(Client::GrantTypes).default("client_credentials"))
                    .col(text(Client::Scopes).default(""))
                    .col(boolean(Client::Enabled).default(true))
                    .col(
                        timestamp_with_time_zone(Client::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Client::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClientSecret::Table)
                    .if_not_exists()
                    .col(pk_auto(ClientSecret::Id))
                    .col(string(ClientSecret::ClientId))
                    .col(string(ClientSecret::Value))
                    .col(
                        timestamp_with_time_zone(ClientSecret::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_client_secret_client")
                            .from(ClientSecret::Table, ClientSecret::ClientId)
                            .to(Client::Table, Client::ClientId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_client_secret_client_id")
                    .table(ClientSecret::Table)
                    .col(ClientSecret::ClientId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth2_client_secret_client_id")
                    .table(ClientSecret::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ClientSecret::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Client::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    ClientId,
    ClientName,
    GrantTypes,
    Scopes,
    Enabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ClientSecret {
    #[sea_orm(iden = "oauth2_client_secret")]
    Table,
    Id,
    ClientId,
    Value,
    CreatedAt,
}
