//! Failure paths of the account workflow, driven by a scripted identity store.

mod common;

use async_trait::async_trait;
use common::RecordingMailer;
use identity_provider::config::SiteConfig;
use identity_provider::error::{StoreResult, UserError};
use identity_provider::users::model::ResetPasswordRequest;
use identity_provider::users::{
    IdentityError, IdentityResult, Role, User, UserDto, UserManager, UserStatus, UserStore,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory store whose refusals are configured per test.
#[derive(Default)]
struct ScriptedStore {
    users: Mutex<BTreeMap<String, User>>,
    refuse_role_assignment: bool,
    refuse_update_of: Option<String>,
    reset_result: Option<IdentityResult>,
}

impl ScriptedStore {
    fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().insert(user.id.clone(), user);
        self
    }
}

fn pending_user(id: &str, email: &str) -> User {
    let mut user = UserDto {
        email: email.to_string(),
        given_name: "Test".to_string(),
        family_name: id.to_string(),
        ..UserDto::default()
    }
    .to_new_user(UserStatus::Pending, true);
    user.id = id.to_string();
    user.roles = vec![Role::Reporter];
    user
}

#[async_trait]
impl UserStore for ScriptedStore {
    async fn all_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: &User, _password: &str) -> StoreResult<IdentityResult> {
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(IdentityResult::success())
    }

    async fn update(&self, user: &User) -> StoreResult<IdentityResult> {
        if self.refuse_update_of.as_deref() == Some(user.id.as_str()) {
            return Ok(IdentityResult::failed_with(IdentityError::new(
                "ConcurrencyFailure",
                "Optimistic concurrency failure, object has been modified.",
            )));
        }
        self.users
            .lock()
            .unwrap()
            .insert(user.id.clone(), user.clone());
        Ok(IdentityResult::success())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<IdentityResult> {
        self.users.lock().unwrap().remove(user_id);
        Ok(IdentityResult::success())
    }

    async fn roles_of(&self, user_id: &str) -> StoreResult<Vec<Role>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(user_id)
            .map(|u| u.roles.clone())
            .unwrap_or_default())
    }

    async fn add_to_role(&self, user_id: &str, role: Role) -> StoreResult<IdentityResult> {
        if self.refuse_role_assignment {
            return Ok(IdentityResult::failed_with(IdentityError::new(
                "InvalidRoleName",
                "Role name is invalid.",
            )));
        }
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.roles.push(role);
        }
        Ok(IdentityResult::success())
    }

    async fn remove_from_roles(&self, user_id: &str, roles: &[Role]) -> StoreResult<IdentityResult> {
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.roles.retain(|r| !roles.contains(r));
        }
        Ok(IdentityResult::success())
    }

    async fn generate_password_reset_token(&self, user: &User) -> StoreResult<String> {
        Ok(format!("token-for-{}", user.id))
    }

    async fn reset_password(
        &self,
        _user: &User,
        _token: &str,
        _new_password: &str,
    ) -> StoreResult<IdentityResult> {
        Ok(self.reset_result.clone().unwrap_or_default())
    }

    async fn change_password(
        &self,
        _user: &User,
        _current_password: &str,
        _new_password: &str,
    ) -> StoreResult<IdentityResult> {
        Ok(IdentityResult::success())
    }

    async fn check_password(&self, _user: &User, _password: &str) -> StoreResult<bool> {
        Ok(true)
    }
}

fn manager(store: ScriptedStore) -> (UserManager, Arc<RecordingMailer>, Arc<ScriptedStore>) {
    let store = Arc::new(store);
    let mailer = Arc::new(RecordingMailer::default());
    let site = SiteConfig {
        name: "Field Reports".to_string(),
        url: "https://reports.example.org/".to_string(),
        contact_email: "help@example.org".to_string(),
    };
    (
        UserManager::new(store.clone(), mailer.clone(), site),
        mailer,
        store,
    )
}

#[tokio::test]
async fn test_role_assignment_failure_leaves_user_persisted() {
    let (users, mailer, store) = manager(ScriptedStore {
        refuse_role_assignment: true,
        ..ScriptedStore::default()
    });
    let input = UserDto {
        email: "new@example.org".to_string(),
        given_name: "New".to_string(),
        family_name: "User".to_string(),
        role: Some("2".to_string()),
        password: Some("pw".to_string()),
        ..UserDto::default()
    };

    let err = users.create(&input).await.unwrap_err();
    match err {
        UserError::RoleAssignment { user_id, errors } => {
            assert_eq!(errors, vec!["Role name is invalid.".to_string()]);
            // No compensation: the record stays behind without a role.
            let kept = store.find_by_id(&user_id).await.unwrap().unwrap();
            assert!(kept.roles.is_empty());
        }
        other => panic!("expected RoleAssignment, got {other:?}"),
    }
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_pending_registration_stops_before_mail_when_role_fails() {
    let (users, mailer, _store) = manager(ScriptedStore {
        refuse_role_assignment: true,
        ..ScriptedStore::default()
    });
    let input = UserDto {
        email: "applicant@example.org".to_string(),
        given_name: "App".to_string(),
        family_name: "Licant".to_string(),
        password: Some("pw".to_string()),
        ..UserDto::default()
    };
    assert!(matches!(
        users.create_pending(&input).await,
        Err(UserError::RoleAssignment { .. })
    ));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_unrecognized_reset_refusal_is_unexpected() {
    let (users, _mailer, _store) = manager(
        ScriptedStore {
            reset_result: Some(IdentityResult::failed_with(IdentityError::new(
                "ConcurrencyFailure",
                "Optimistic concurrency failure, object has been modified.",
            ))),
            ..ScriptedStore::default()
        }
        .with_user(pending_user("u1", "u1@example.org")),
    );
    let request = ResetPasswordRequest {
        email: "u1@example.org".to_string(),
        password: "pw".to_string(),
        confirm_password: "pw".to_string(),
    };
    let err = users
        .change_forgotten_password("token", &request)
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::Unexpected(msg) if msg.contains("concurrency")));
}

#[tokio::test]
async fn test_approve_aborts_on_first_refusal() {
    let (users, mailer, store) = manager(
        ScriptedStore {
            refuse_update_of: Some("b".to_string()),
            ..ScriptedStore::default()
        }
        .with_user(pending_user("a", "a@example.org"))
        .with_user(pending_user("b", "b@example.org"))
        .with_user(pending_user("c", "c@example.org")),
    );

    let ids = ["a", "b", "c"].map(String::from);
    let err = users.approve(&ids).await.unwrap_err();
    assert!(matches!(err, UserError::Rejected(_)));

    let a = store.find_by_id("a").await.unwrap().unwrap();
    let c = store.find_by_id("c").await.unwrap().unwrap();
    assert_eq!(a.status, UserStatus::Active);
    assert!(!a.lockout_enabled);
    assert_eq!(c.status, UserStatus::Pending);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@example.org");
}

#[tokio::test]
async fn test_approval_mail_failure_keeps_user_active() {
    let (users, mailer, store) = manager(
        ScriptedStore::default().with_user(pending_user("a", "a@example.org")),
    );
    mailer.fail_from_now_on();

    let err = users.approve(&["a".to_string()]).await.unwrap_err();
    assert!(matches!(err, UserError::Mail(_)));
    let a = store.find_by_id("a").await.unwrap().unwrap();
    assert_eq!(a.status, UserStatus::Active);
}

#[tokio::test]
async fn test_reset_link_trims_trailing_slash_of_site_url() {
    let (users, mailer, _store) = manager(
        ScriptedStore::default().with_user(pending_user("u1", "u1@example.org")),
    );
    assert!(users.request_password_change("U1@example.org").await.unwrap());
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text_body.contains(
        "https://reports.example.org/resetpassword?token=token-for-u1&email=u1%40example.org"
    ));
}
