//! Account lifecycle: registration, approval, role reconciliation and the
//! forgotten-password flow.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::email_templates::{
    ApprovalEmailTemplate, ContactEmailTemplate, PasswordResetEmailTemplate,
    PendingRegistrationEmailTemplate,
};
use crate::error::UserError;
use crate::mailer::{MailError, Mailer, OutgoingEmail};
use crate::users::model::{
    ContactRequest, ResetPasswordRequest, Role, SimpleUserDto, User, UserDto, UserProfileDto,
    UserStatus,
};
use crate::users::store::{IdentityResult, UserStore};

const PASSWORD_POLICY_PREFIX: &str = "Passwords must";

/// Result of redeeming a password-reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordResetOutcome {
    Happy,
    BadToken,
    InvalidPassword(Vec<String>),
    UserDoesNotExist,
}

/// Result of a signed-in user changing their own password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChangeOutcome {
    Changed,
    IncorrectPassword,
    InvalidPassword(Vec<String>),
    UserDoesNotExist,
}

fn policy_messages(result: &IdentityResult) -> Vec<String> {
    result
        .descriptions()
        .into_iter()
        .filter(|d| d.starts_with(PASSWORD_POLICY_PREFIX))
        .collect()
}

/// Maps a store response to a reset outcome. Only the first error decides.
pub fn classify_reset_result(result: &IdentityResult) -> Result<PasswordResetOutcome, UserError> {
    let Some(first) = result.errors.first() else {
        return Ok(PasswordResetOutcome::Happy);
    };
    if first.description.contains("Invalid token") {
        Ok(PasswordResetOutcome::BadToken)
    } else if first.description.starts_with(PASSWORD_POLICY_PREFIX) {
        Ok(PasswordResetOutcome::InvalidPassword(policy_messages(result)))
    } else {
        Err(UserError::Unexpected(first.description.clone()))
    }
}

pub fn classify_change_result(
    result: &IdentityResult,
) -> Result<PasswordChangeOutcome, UserError> {
    let Some(first) = result.errors.first() else {
        return Ok(PasswordChangeOutcome::Changed);
    };
    if first.code == "PasswordMismatch" {
        Ok(PasswordChangeOutcome::IncorrectPassword)
    } else if first.description.starts_with(PASSWORD_POLICY_PREFIX) {
        Ok(PasswordChangeOutcome::InvalidPassword(policy_messages(
            result,
        )))
    } else {
        Err(UserError::Unexpected(first.description.clone()))
    }
}

pub struct UserManager {
    store: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    site: SiteConfig,
}

impl UserManager {
    pub fn new(store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>, site: SiteConfig) -> Self {
        Self {
            store,
            mailer,
            site,
        }
    }

    /// Every user, mapped to the transport model on iteration.
    pub async fn find_all(&self) -> Result<impl Iterator<Item = UserDto>, UserError> {
        let users = self.store.all_users().await?;
        Ok(users.into_iter().map(UserDto::from))
    }

    /// Users awaiting approval.
    pub async fn find_all_pending(&self) -> Result<impl Iterator<Item = UserDto>, UserError> {
        let users = self.store.all_users().await?;
        Ok(users
            .into_iter()
            .filter(|u| u.status == UserStatus::Pending)
            .map(UserDto::from))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserDto>, UserError> {
        Ok(self.store.find_by_id(id).await?.map(UserDto::from))
    }

    /// Id and display name of every active user.
    pub async fn simple_list(&self) -> Result<Vec<SimpleUserDto>, UserError> {
        let users = self.store.all_users().await?;
        Ok(users
            .iter()
            .filter(|u| u.status == UserStatus::Active)
            .map(|u| SimpleUserDto {
                id: u.id.clone(),
                name: u.full_name(),
            })
            .collect())
    }

    /// Administrative creation. Status and lockout come from the input, status
    /// defaulting to active.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: &UserDto) -> Result<UserDto, UserError> {
        let errors = input.validate(true, true);
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let role = parse_role(input)?;
        let mut user = input.to_new_user(
            input.status.unwrap_or(UserStatus::Active),
            input.lockout_enabled,
        );
        let password = input.password.as_deref().unwrap_or_default();

        self.persist_new(&user, password, role).await?;
        user.roles = vec![role];
        tracing::info!(user_id = %user.id, role = %role, "User created");
        Ok(UserDto::from(&user))
    }

    /// Self-registration. The account is always pending, locked and a Reporter,
    /// whatever the input says.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_pending(&self, input: &UserDto) -> Result<UserDto, UserError> {
        let errors = input.validate(true, false);
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let mut user = input.to_new_user(UserStatus::Pending, true);
        let password = input.password.as_deref().unwrap_or_default();

        self.persist_new(&user, password, Role::Reporter).await?;
        user.roles = vec![Role::Reporter];

        let template = PendingRegistrationEmailTemplate {
            site_name: self.site.name.clone(),
            site_url: self.site.url.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            password: password.to_string(),
        };
        self.send(
            &user.email,
            template.subject(),
            template.render_text(),
            template.render_html(),
        )
        .await?;
        tracing::info!(user_id = %user.id, "Pending registration recorded");
        Ok(UserDto::from(&user))
    }

    /// Creates the record, then assigns the role. A failed assignment leaves the
    /// record in place.
    async fn persist_new(&self, user: &User, password: &str, role: Role) -> Result<(), UserError> {
        let created = self.store.create(user, password).await?;
        if !created.succeeded() {
            return Err(UserError::Rejected(created.descriptions()));
        }
        let assigned = self.store.add_to_role(&user.id, role).await?;
        if !assigned.succeeded() {
            tracing::error!(
                user_id = %user.id,
                role = %role,
                errors = ?assigned.descriptions(),
                "User persisted but role assignment failed"
            );
            return Err(UserError::RoleAssignment {
                user_id: user.id.clone(),
                errors: assigned.descriptions(),
            });
        }
        Ok(())
    }

    /// Overwrites the mutable fields, then replaces the role.
    #[tracing::instrument(skip(self, input), fields(user_id = ?input.id))]
    pub async fn update(&self, input: &UserDto) -> Result<(), UserError> {
        let Some(id) = input.id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(UserError::Validation(vec!["id is required".to_string()]));
        };
        let errors = input.validate(false, true);
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let role = parse_role(input)?;

        let mut user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;
        input.apply_to(&mut user);
        let updated = self.store.update(&user).await?;
        if !updated.succeeded() {
            return Err(UserError::Rejected(updated.descriptions()));
        }

        let current = self.store.roles_of(id).await?;
        let removed = self.store.remove_from_roles(id, &current).await?;
        if !removed.succeeded() {
            return Err(UserError::RoleAssignment {
                user_id: id.to_string(),
                errors: removed.descriptions(),
            });
        }
        let assigned = self.store.add_to_role(id, role).await?;
        if !assigned.succeeded() {
            tracing::error!(user_id = %id, role = %role, "User left without a role");
            return Err(UserError::RoleAssignment {
                user_id: id.to_string(),
                errors: assigned.descriptions(),
            });
        }
        Ok(())
    }

    /// Activates and unlocks each listed user, in order, mailing each one.
    ///
    /// Unknown ids are skipped. The first failure aborts the batch; users
    /// approved before it stay approved. Returns how many were approved.
    #[tracing::instrument(skip(self))]
    pub async fn approve(&self, ids: &[String]) -> Result<usize, UserError> {
        let mut approved = 0;
        for id in ids {
            let Some(mut user) = self.store.find_by_id(id).await? else {
                tracing::debug!(user_id = %id, "Skipping unknown user");
                continue;
            };
            user.status = UserStatus::Active;
            user.lockout_enabled = false;
            let updated = self.store.update(&user).await?;
            if !updated.succeeded() {
                return Err(UserError::Rejected(updated.descriptions()));
            }

            let template = ApprovalEmailTemplate {
                site_name: self.site.name.clone(),
                site_url: self.site.url.clone(),
                full_name: user.full_name(),
            };
            self.send(
                &user.email,
                template.subject(),
                template.render_text(),
                template.render_html(),
            )
            .await?;
            approved += 1;
        }
        tracing::info!(approved, requested = ids.len(), "Approval batch finished");
        Ok(approved)
    }

    /// Case-insensitive scan over every user.
    async fn find_by_email_scan(&self, email: &str) -> Result<Option<User>, UserError> {
        let email = email.trim();
        Ok(self
            .store
            .all_users()
            .await?
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    /// Mails a reset link when the address belongs to a user. Returns whether it did.
    #[tracing::instrument(skip(self))]
    pub async fn request_password_change(&self, email: &str) -> Result<bool, UserError> {
        let Some(user) = self.find_by_email_scan(email).await? else {
            tracing::info!("Password reset requested for unknown e-mail");
            return Ok(false);
        };
        let token = self.store.generate_password_reset_token(&user).await?;
        let reset_url = format!(
            "{}/resetpassword?token={}&email={}",
            self.site.url.trim_end_matches('/'),
            urlencoding::encode(&token),
            urlencoding::encode(&user.email)
        );
        let template = PasswordResetEmailTemplate {
            site_name: self.site.name.clone(),
            full_name: user.full_name(),
            reset_url,
        };
        self.send(
            &user.email,
            template.subject(),
            template.render_text(),
            template.render_html(),
        )
        .await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self, token, request), fields(email = %request.email))]
    pub async fn change_forgotten_password(
        &self,
        token: &str,
        request: &ResetPasswordRequest,
    ) -> Result<PasswordResetOutcome, UserError> {
        let errors = request.validate();
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let Some(user) = self.find_by_email_scan(&request.email).await? else {
            return Ok(PasswordResetOutcome::UserDoesNotExist);
        };
        let result = self
            .store
            .reset_password(&user, token, &request.password)
            .await?;
        let outcome = classify_reset_result(&result);
        if let Err(e) = &outcome {
            tracing::error!(user_id = %user.id, error = %e, "Password reset failed unexpectedly");
        }
        outcome
    }

    #[tracing::instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<PasswordChangeOutcome, UserError> {
        let Some(user) = self.store.find_by_id(id).await? else {
            return Ok(PasswordChangeOutcome::UserDoesNotExist);
        };
        let result = self
            .store
            .change_password(&user, current_password, new_password)
            .await?;
        classify_change_result(&result)
    }

    pub async fn profile(&self, id: &str) -> Result<Option<UserProfileDto>, UserError> {
        Ok(self
            .store
            .find_by_id(id)
            .await?
            .map(|u| UserProfileDto::from(&u)))
    }

    /// Updates name, phone and address only. Returns false when the user is unknown.
    #[tracing::instrument(skip(self, profile))]
    pub async fn update_profile(
        &self,
        id: &str,
        profile: &UserProfileDto,
    ) -> Result<bool, UserError> {
        let errors = profile.validate();
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let Some(mut user) = self.store.find_by_id(id).await? else {
            return Ok(false);
        };
        user.apply_profile(profile);
        let updated = self.store.update(&user).await?;
        if !updated.succeeded() {
            return Err(UserError::Rejected(updated.descriptions()));
        }
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<bool, UserError> {
        if self.store.find_by_id(id).await?.is_none() {
            return Ok(false);
        }
        let deleted = self.store.delete(id).await?;
        if !deleted.succeeded() {
            return Err(UserError::Rejected(deleted.descriptions()));
        }
        tracing::info!(user_id = %id, "User deleted");
        Ok(true)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserDto>, UserError> {
        Ok(self.store.find_by_email(email).await?.map(UserDto::from))
    }

    /// Resolves resource-owner credentials to an active, unlocked user.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, UserError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            return Ok(None);
        };
        if user.status != UserStatus::Active || user.lockout_enabled {
            tracing::info!(user_id = %user.id, status = %user.status, "Sign-in refused for inactive or locked user");
            return Ok(None);
        }
        if !self.store.check_password(&user, password).await? {
            return Ok(None);
        }
        Ok(Some(user))
    }

    #[tracing::instrument(skip(self, request), fields(from = %request.email))]
    pub async fn send_contact_message(&self, request: &ContactRequest) -> Result<(), UserError> {
        let errors = request.validate();
        if !errors.is_empty() {
            return Err(UserError::Validation(errors));
        }
        let template = ContactEmailTemplate {
            site_name: self.site.name.clone(),
            sender_name: request.name.trim().to_string(),
            sender_email: request.email.trim().to_string(),
            message: request.message.clone(),
        };
        self.send(
            &self.site.contact_email,
            template.subject(),
            template.render_text(),
            template.render_html(),
        )
        .await
    }

    async fn send(
        &self,
        to: &str,
        subject: String,
        text_body: String,
        html_body: Result<String, askama::Error>,
    ) -> Result<(), UserError> {
        let html_body = html_body.map_err(|e| MailError::Template(e.to_string()))?;
        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject,
                text_body,
                html_body: Some(html_body),
            })
            .await?;
        Ok(())
    }
}

fn parse_role(input: &UserDto) -> Result<Role, UserError> {
    input
        .role
        .as_deref()
        .and_then(Role::parse_numeric)
        .ok_or_else(|| UserError::Validation(vec!["role must be one of 1, 2, 3, 4".to_string()]))
}
