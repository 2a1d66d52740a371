//! User domain types and the transport models exposed over HTTP.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Fixed set of roles. The discriminants are the ids seeded in the `role` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Administrator = 1,
    Reporter = 2,
    Coordinator = 3,
    Lead = 4,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Administrator,
        Role::Reporter,
        Role::Coordinator,
        Role::Lead,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Reporter => "Reporter",
            Role::Coordinator => "Coordinator",
            Role::Lead => "Lead",
        }
    }

    /// Parses the numeric role field of a [`UserDto`] (e.g. `"2"`).
    pub fn parse_numeric(value: &str) -> Option<Role> {
        value.trim().parse::<i32>().ok().and_then(Role::from_id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown role '{s}'"))
    }
}

/// Account lifecycle: `pending --approve--> active`.
///
/// `Inactive` is only reachable through an explicit administrative update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UserStatus::Pending),
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            other => Err(format!("Unknown user status '{other}'")),
        }
    }
}

/// A persisted user as seen by the workflow layer.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub phone_number: Option<String>,
    pub secondary_phone_number: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state_province: Option<String>,
    pub postal_code: Option<String>,
    pub lockout_enabled: bool,
    pub status: UserStatus,
    pub roles: Vec<Role>,
    pub password_hash: String,
    pub security_stamp: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// The single effective role: the lowest role id held.
    pub fn role(&self) -> Option<Role> {
        self.roles.iter().copied().min()
    }

    /// Copies the profile fields (name, phones, address) from a transport model.
    pub fn apply_profile(&mut self, profile: &UserProfileDto) {
        self.given_name = profile.given_name.trim().to_string();
        self.family_name = profile.family_name.trim().to_string();
        self.phone_number = profile.phone_number.clone();
        self.secondary_phone_number = profile.secondary_phone_number.clone();
        self.address_line1 = profile.address_line1.clone();
        self.address_line2 = profile.address_line2.clone();
        self.city = profile.city.clone();
        self.state_province = profile.state_province.clone();
        self.postal_code = profile.postal_code.clone();
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Transport model for administrative user management and self-registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    /// Ignored on create, required on update.
    #[serde(default)]
    pub id: Option<String>,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub secondary_phone_number: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub lockout_enabled: bool,
    #[serde(default)]
    pub status: Option<UserStatus>,
    /// Numeric role id as text, e.g. `"2"` for Reporter.
    #[serde(default)]
    pub role: Option<String>,
    /// Only read on create and registration. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl UserDto {
    /// Returns one message per invalid field.
    pub fn validate(&self, require_password: bool, require_role: bool) -> Vec<String> {
        let mut errors = Vec::new();
        let email = self.email.trim();
        if email.is_empty() {
            errors.push("email is required".to_string());
        } else if !is_plausible_email(email) {
            errors.push("email is not a valid address".to_string());
        }
        if self.given_name.trim().is_empty() {
            errors.push("given_name is required".to_string());
        }
        if self.family_name.trim().is_empty() {
            errors.push("family_name is required".to_string());
        }
        if require_password && self.password.as_deref().is_none_or(str::is_empty) {
            errors.push("password is required".to_string());
        }
        if require_role {
            match self.role.as_deref() {
                None => errors.push("role is required".to_string()),
                Some(value) if Role::parse_numeric(value).is_none() => {
                    errors.push("role must be one of 1, 2, 3, 4".to_string())
                }
                Some(_) => {}
            }
        }
        errors
    }

    /// Builds a new, not yet persisted user. Credentials are filled in by the store.
    pub fn to_new_user(&self, status: UserStatus, lockout_enabled: bool) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: uuid::Uuid::new_v4().to_string(),
            email: normalize_email(&self.email),
            given_name: self.given_name.trim().to_string(),
            family_name: self.family_name.trim().to_string(),
            phone_number: self.phone_number.clone(),
            secondary_phone_number: self.secondary_phone_number.clone(),
            address_line1: self.address_line1.clone(),
            address_line2: self.address_line2.clone(),
            city: self.city.clone(),
            state_province: self.state_province.clone(),
            postal_code: self.postal_code.clone(),
            lockout_enabled,
            status,
            roles: Vec::new(),
            password_hash: String::new(),
            security_stamp: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the mutable fields of an existing user.
    pub fn apply_to(&self, user: &mut User) {
        user.email = normalize_email(&self.email);
        user.given_name = self.given_name.trim().to_string();
        user.family_name = self.family_name.trim().to_string();
        user.phone_number = self.phone_number.clone();
        user.secondary_phone_number = self.secondary_phone_number.clone();
        user.address_line1 = self.address_line1.clone();
        user.address_line2 = self.address_line2.clone();
        user.city = self.city.clone();
        user.state_province = self.state_province.clone();
        user.postal_code = self.postal_code.clone();
        user.lockout_enabled = self.lockout_enabled;
        if let Some(status) = self.status {
            user.status = status;
        }
    }
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id.clone()),
            email: user.email.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            phone_number: user.phone_number.clone(),
            secondary_phone_number: user.secondary_phone_number.clone(),
            address_line1: user.address_line1.clone(),
            address_line2: user.address_line2.clone(),
            city: user.city.clone(),
            state_province: user.state_province.clone(),
            postal_code: user.postal_code.clone(),
            lockout_enabled: user.lockout_enabled,
            status: Some(user.status),
            role: user.role().map(|r| r.id().to_string()),
            password: None,
        }
    }
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        UserDto::from(&user)
    }
}

/// Self-service view of an account: everything a user may edit about themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfileDto {
    #[serde(default)]
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub secondary_phone_number: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl UserProfileDto {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.given_name.trim().is_empty() {
            errors.push("given_name is required".to_string());
        }
        if self.family_name.trim().is_empty() {
            errors.push("family_name is required".to_string());
        }
        errors
    }
}

impl From<&User> for UserProfileDto {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            phone_number: user.phone_number.clone(),
            secondary_phone_number: user.secondary_phone_number.clone(),
            address_line1: user.address_line1.clone(),
            address_line2: user.address_line2.clone(),
            city: user.city.clone(),
            state_province: user.state_province.clone(),
            postal_code: user.postal_code.clone(),
        }
    }
}

/// Id and display name, for pick-lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SimpleUserDto {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.email.trim().is_empty() {
            errors.push("email is required".to_string());
        }
        if self.password.is_empty() {
            errors.push("password is required".to_string());
        }
        if self.password != self.confirm_password {
            errors.push("confirm_password does not match password".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApproveRequest {
    pub ids: Vec<String>,
}

/// A message submitted through the public contact form.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if !is_plausible_email(self.email.trim()) {
            errors.push("email is not a valid address".to_string());
        }
        if self.message.trim().is_empty() {
            errors.push("message is required".to_string());
        }
        errors
    }
}
