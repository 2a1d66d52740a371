//! Users, the fixed role table and the user to role join table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

const ROLES: [(i32, &str); 4] = [
    (1, "Administrator"),
    (2, "Reporter"),
    (3, "Coordinator"),
    (4, "Lead"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(string(AppUser::Id).primary_key())
                    .col(string_uniq(AppUser::Email))
                    .col(string(AppUser::GivenName))
                    .col(string(AppUser::FamilyName))
                    .col(string_null(AppUser::PhoneNumber))
                    .col(string_null(AppUser::SecondaryPhoneNumber))
                    .col(string_null(AppUser::AddressLine1))
                    .col(string_null(AppUser::AddressLine2))
                    .col(string_null(AppUser::City))
                    .col(string_null(AppUser::StateProvince))
                    .col(string_null(AppUser::PostalCode))
                    .col(boolean(AppUser::LockoutEnabled).default(false))
                    .col(string(AppUser::Status).default("pending"))
                    .col(string(AppUser::PasswordHash))
                    .col(string(AppUser::SecurityStamp))
                    .col(
                        timestamp_with_time_zone(AppUser::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AppUser::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_app_user_status")
                    .table(AppUser::Table)
                    .col(AppUser::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(integer(Role::Id).primary_key())
                    .col(string_uniq(Role::Name))
                    .to_owned(),
            )
            .await?;

        let mut seed = Query::insert();
        seed.into_table(Role::Table).columns([Role::Id, Role::Name]);
        for (id, name) in ROLES {
            seed.values_panic([id.into(), name.into()]);
        }
        manager.exec_stmt(seed).await?;

        manager
            .create_table(
                Table::create()
                    .table(UserRole::Table)
                    .if_not_exists()
                    .col(string(UserRole::UserId))
                    .col(integer(UserRole::RoleId))
                    .primary_key(
                        Index::create()
                            .col(UserRole::UserId)
                            .col(UserRole::RoleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_role_user")
                            .from(UserRole::Table, UserRole::UserId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_role_role")
                            .from(UserRole::Table, UserRole::RoleId)
                            .to(Role::Table, Role::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserRole::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_app_user_status")
                    .table(AppUser::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
    Email,
    GivenName,
    FamilyName,
    PhoneNumber,
    SecondaryPhoneNumber,
    #[sea_orm(iden = "address_line1")]
    AddressLine1,
    #[sea_orm(iden = "address_line2")]
    AddressLine2,
    City,
    StateProvince,
    PostalCode,
    LockoutEnabled,
    Status,
    PasswordHash,
    SecurityStamp,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Role {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum UserRole {
    Table,
    UserId,
    RoleId,
}
