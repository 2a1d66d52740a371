use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use time::OffsetDateTime;

use crate::config::PasswordPolicy;
use crate::entity::{app_user, user_role};
use crate::error::{StoreError, StoreResult};
use crate::users::model::{Role, User, UserStatus, normalize_email};
use crate::users::password::{
    generate_security_stamp, hash_password, validate_password, verify_password,
};
use crate::users::reset_token::ResetTokenCodec;
use crate::users::store::{IdentityError, IdentityResult, UserStore};

/// [`UserStore`] backed by the `app_user` and `user_role` tables.
pub struct DbUserStore {
    db: Arc<DatabaseConnection>,
    policy: PasswordPolicy,
    reset_tokens: ResetTokenCodec,
}

impl DbUserStore {
    pub fn new(db: Arc<DatabaseConnection>, policy: PasswordPolicy, signing_secret: &str) -> Self {
        Self {
            db,
            policy,
            reset_tokens: ResetTokenCodec::new(signing_secret),
        }
    }

    async fn model(&self, user_id: &str) -> StoreResult<Option<app_user::Model>> {
        Ok(app_user::Entity::find_by_id(user_id.to_string())
            .one(self.db.as_ref())
            .await?)
    }

    async fn load_roles(&self, user_id: &str) -> StoreResult<Vec<Role>> {
        let rows = user_role::Entity::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(user_role::Column::RoleId)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.iter().filter_map(role_of_row).collect())
    }

    async fn email_in_use(&self, email: &str, except_id: Option<&str>) -> StoreResult<bool> {
        let mut query = app_user::Entity::find().filter(app_user::Column::Email.eq(email));
        if let Some(id) = except_id {
            query = query.filter(app_user::Column::Id.ne(id));
        }
        Ok(query.one(self.db.as_ref()).await?.is_some())
    }

    /// Hashes and stores `new_password`, rotating the security stamp.
    async fn store_password(&self, model: app_user::Model, new_password: &str) -> StoreResult<()> {
        let hash = hash_password(new_password)?;
        let mut active: app_user::ActiveModel = model.into();
        active.password_hash = Set(hash);
        active.security_stamp = Set(generate_security_stamp()?);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}

fn role_of_row(row: &user_role::Model) -> Option<Role> {
    let role = Role::from_id(row.role_id);
    if role.is_none() {
        tracing::warn!(
            user_id = %row.user_id,
            role_id = row.role_id,
            "Ignoring assignment to unknown role"
        );
    }
    role
}

fn to_domain(model: app_user::Model, roles: Vec<Role>) -> StoreResult<User> {
    let status = model
        .status
        .parse::<UserStatus>()
        .map_err(StoreError::Corrupt)?;
    Ok(User {
        id: model.id,
        email: model.email,
        given_name: model.given_name,
        family_name: model.family_name,
        phone_number: model.phone_number,
        secondary_phone_number: model.secondary_phone_number,
        address_line1: model.address_line1,
        address_line2: model.address_line2,
        city: model.city,
        state_province: model.state_province,
        postal_code: model.postal_code,
        lockout_enabled: model.lockout_enabled,
        status,
        roles,
        password_hash: model.password_hash,
        security_stamp: model.security_stamp,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn all_users(&self) -> StoreResult<Vec<User>> {
        let models = app_user::Entity::find()
            .order_by_asc(app_user::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        let mut roles: HashMap<String, Vec<Role>> = HashMap::new();
        for row in user_role::Entity::find()
            .order_by_asc(user_role::Column::RoleId)
            .all(self.db.as_ref())
            .await?
        {
            if let Some(role) = role_of_row(&row) {
                roles.entry(row.user_id).or_default().push(role);
            }
        }
        models
            .into_iter()
            .map(|m| {
                let user_roles = roles.remove(&m.id).unwrap_or_default();
                to_domain(m, user_roles)
            })
            .collect()
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        match self.model(id).await? {
            Some(model) => {
                let roles = self.load_roles(id).await?;
                Ok(Some(to_domain(model, roles)?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let found = app_user::Entity::find()
            .filter(app_user::Column::Email.eq(normalize_email(email)))
            .one(self.db.as_ref())
            .await?;
        match found {
            Some(model) => {
                let roles = self.load_roles(&model.id).await?;
                Ok(Some(to_domain(model, roles)?))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, user, password), fields(user_id = %user.id))]
    async fn create(&self, user: &User, password: &str) -> StoreResult<IdentityResult> {
        let email = normalize_email(&user.email);
        let mut errors = Vec::new();
        if self.email_in_use(&email, None).await? {
            errors.push(IdentityError::duplicate_email(&email));
        }
        errors.extend(validate_password(&self.policy, password));
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }

        let now = OffsetDateTime::now_utc();
        let model = app_user::ActiveModel {
            id: Set(user.id.clone()),
            email: Set(email),
            given_name: Set(user.given_name.clone()),
            family_name: Set(user.family_name.clone()),
            phone_number: Set(user.phone_number.clone()),
            secondary_phone_number: Set(user.secondary_phone_number.clone()),
            address_line1: Set(user.address_line1.clone()),
            address_line2: Set(user.address_line2.clone()),
            city: Set(user.city.clone()),
            state_province: Set(user.state_province.clone()),
            postal_code: Set(user.postal_code.clone()),
            lockout_enabled: Set(user.lockout_enabled),
            status: Set(user.status.as_str().to_string()),
            password_hash: Set(hash_password(password)?),
            security_stamp: Set(generate_security_stamp()?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(self.db.as_ref()).await?;
        tracing::info!("User created");
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> StoreResult<IdentityResult> {
        let Some(model) = self.model(&user.id).await? else {
            return Ok(IdentityResult::failed_with(IdentityError::user_not_found(
                &user.id,
            )));
        };
        let email = normalize_email(&user.email);
        if self.email_in_use(&email, Some(&user.id)).await? {
            return Ok(IdentityResult::failed_with(IdentityError::duplicate_email(
                &email,
            )));
        }

        let mut active: app_user::ActiveModel = model.into();
        active.email = Set(email);
        active.given_name = Set(user.given_name.clone());
        active.family_name = Set(user.family_name.clone());
        active.phone_number = Set(user.phone_number.clone());
        active.secondary_phone_number = Set(user.secondary_phone_number.clone());
        active.address_line1 = Set(user.address_line1.clone());
        active.address_line2 = Set(user.address_line2.clone());
        active.city = Set(user.city.clone());
        active.state_province = Set(user.state_province.clone());
        active.postal_code = Set(user.postal_code.clone());
        active.lockout_enabled = Set(user.lockout_enabled);
        active.status = Set(user.status.as_str().to_string());
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(self.db.as_ref()).await?;
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, user_id: &str) -> StoreResult<IdentityResult> {
        let txn = self.db.begin().await?;
        user_role::Entity::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let deleted = app_user::Entity::delete_by_id(user_id.to_string())
            .exec(&txn)
            .await?;
        txn.commit().await?;
        if deleted.rows_affected == 0 {
            return Ok(IdentityResult::failed_with(IdentityError::user_not_found(
                user_id,
            )));
        }
        Ok(IdentityResult::success())
    }

    async fn roles_of(&self, user_id: &str) -> StoreResult<Vec<Role>> {
        self.load_roles(user_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn add_to_role(&self, user_id: &str, role: Role) -> StoreResult<IdentityResult> {
        if self.model(user_id).await?.is_none() {
            return Ok(IdentityResult::failed_with(IdentityError::user_not_found(
                user_id,
            )));
        }
        let existing = user_role::Entity::find_by_id((user_id.to_string(), role.id()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Ok(IdentityResult::failed_with(IdentityError::new(
                "UserAlreadyInRole",
                format!("User already in role '{role}'."),
            )));
        }
        user_role::ActiveModel {
            user_id: Set(user_id.to_string()),
            role_id: Set(role.id()),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_from_roles(
        &self,
        user_id: &str,
        roles: &[Role],
    ) -> StoreResult<IdentityResult> {
        if roles.is_empty() {
            return Ok(IdentityResult::success());
        }
        let current = self.load_roles(user_id).await?;
        let missing: Vec<IdentityError> = roles
            .iter()
            .filter(|r| !current.contains(r))
            .map(|r| IdentityError::new("UserNotInRole", format!("User is not in role '{r}'.")))
            .collect();
        if !missing.is_empty() {
            return Ok(IdentityResult::failed(missing));
        }
        user_role::Entity::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.is_in(roles.iter().map(|r| r.id())))
            .exec(self.db.as_ref())
            .await?;
        Ok(IdentityResult::success())
    }

    async fn generate_password_reset_token(&self, user: &User) -> StoreResult<String> {
        self.reset_tokens.issue(&user.id, &user.security_stamp)
    }

    #[tracing::instrument(skip(self, user, token, new_password), fields(user_id = %user.id))]
    async fn reset_password(
        &self,
        user: &User,
        token: &str,
        new_password: &str,
    ) -> StoreResult<IdentityResult> {
        let Some(model) = self.model(&user.id).await? else {
            return Ok(IdentityResult::failed_with(IdentityError::user_not_found(
                &user.id,
            )));
        };
        if !self
            .reset_tokens
            .verify(token, &model.id, &model.security_stamp)
        {
            return Ok(IdentityResult::failed_with(IdentityError::invalid_token()));
        }
        let errors = validate_password(&self.policy, new_password);
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }
        self.store_password(model, new_password).await?;
        Ok(IdentityResult::success())
    }

    #[tracing::instrument(skip(self, user, current_password, new_password), fields(user_id = %user.id))]
    async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> StoreResult<IdentityResult> {
        let Some(model) = self.model(&user.id).await? else {
            return Ok(IdentityResult::failed_with(IdentityError::user_not_found(
                &user.id,
            )));
        };
        if !verify_password(current_password, &model.password_hash) {
            return Ok(IdentityResult::failed_with(
                IdentityError::password_mismatch(),
            ));
        }
        let errors = validate_password(&self.policy, new_password);
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }
        self.store_password(model, new_password).await?;
        Ok(IdentityResult::success())
    }

    async fn check_password(&self, user: &User, password: &str) -> StoreResult<bool> {
        Ok(match self.model(&user.id).await? {
            Some(model) => verify_password(password, &model.password_hash),
            None => false,
        })
    }
}
