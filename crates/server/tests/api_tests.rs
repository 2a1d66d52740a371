//! HTTP-level tests of the management API through the full application router.

mod common;

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use common::{TestContext, admin_token, reset_token_from, test_context, user_token};
use identity_provider::api::app;
use identity_provider::users::{Role, UserDto};
use serde_json::{Value, json};

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn server(ctx: &TestContext) -> TestServer {
    TestServer::new(app(ctx.resources.clone())).expect("create test server")
}

fn new_user(email: &str, role: &str) -> Value {
    json!({
        "email": email,
        "given_name": "Ada",
        "family_name": "Lovelace",
        "role": role,
        "password": "pw",
    })
}

async fn create_user(server: &TestServer, admin: &str, email: &str, role: &str) -> UserDto {
    let response = server
        .post("/api/v1/users")
        .add_header(AUTHORIZATION, bearer(admin))
        .json(&new_user(email, role))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Miscellaneous
// =============================================================================

#[tokio::test]
async fn test_health_and_docs() {
    let ctx = test_context().await;
    let server = server(&ctx);

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "ok");
    server
        .method(axum::http::Method::HEAD, "/healthz")
        .await
        .assert_status_ok();

    server.get("/api-docs").await.assert_status_ok();
}

#[tokio::test]
async fn test_discovery_document() {
    let ctx = test_context().await;
    let response = server(&ctx).get("/.well-known/openid-configuration").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["issuer"], common::ISSUER);
    assert_eq!(body["token_endpoint"], format!("{}/connect/token", common::ISSUER));
    assert_eq!(body["grant_types_supported"], json!(["client_credentials", "password"]));
}

#[tokio::test]
async fn test_contact_form() {
    let ctx = test_context().await;
    let server = server(&ctx);

    server
        .post("/api/v1/contact")
        .json(&json!({"name": "Visitor", "email": "v@example.org", "message": "Hi"}))
        .await
        .assert_status(StatusCode::ACCEPTED);
    assert_eq!(ctx.mailer.sent().len(), 1);

    let response = server
        .post("/api/v1/contact")
        .json(&json!({"name": "", "email": "nope", "message": ""}))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Authentication and authorization
// =============================================================================

#[tokio::test]
async fn test_user_list_requires_token() {
    let ctx = test_context().await;
    let server = server(&ctx);

    server.get("/api/v1/users").await.assert_status_unauthorized();
    server
        .get("/api/v1/users")
        .add_header(AUTHORIZATION, bearer("garbage"))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_token_from_another_issuer_is_refused() {
    let ctx = test_context().await;
    let mut config = common::test_config(identity_provider::config::PasswordPolicy::relaxed());
    config.oauth2.issuer_url = "https://elsewhere.example.org".to_string();
    let foreign = identity_provider::oauth2::TokenIssuer::new(&config.oauth2)
        .issue(identity_provider::oauth2::TokenSubject {
            sub: "admin-1".to_string(),
            role: Some("Administrator".to_string()),
            ..Default::default()
        })
        .unwrap();

    server(&ctx)
        .get("/api/v1/users")
        .add_header(AUTHORIZATION, bearer(&foreign))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_admin_endpoints_refuse_other_roles() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let reporter = user_token(&ctx.resources, "someone", Role::Reporter);

    for path in ["/api/v1/users", "/api/v1/users/pending", "/api/clients"] {
        server
            .get(path)
            .add_header(AUTHORIZATION, bearer(&reporter))
            .await
            .assert_status_forbidden();
    }
    server
        .get("/api/v1/users/simplelist")
        .add_header(AUTHORIZATION, bearer(&reporter))
        .await
        .assert_status_ok();
}

// =============================================================================
// User management
// =============================================================================

#[tokio::test]
async fn test_admin_user_crud() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);

    let created = create_user(&server, &admin, "crud@example.org", "3").await;
    let id = created.id.clone().unwrap();
    assert_eq!(created.role.as_deref(), Some("3"));

    let response = server
        .get(&format!("/api/v1/users/{id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["email"], "crud@example.org");
    assert!(body.get("password").is_none());

    let mut update = new_user("crud@example.org", "4");
    update["id"] = json!(id);
    update["city"] = json!("Lyon");
    server
        .put(&format!("/api/v1/users/{id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&update)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let list: Vec<UserDto> = server
        .get("/api/v1/users")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].role.as_deref(), Some("4"));
    assert_eq!(list[0].city.as_deref(), Some("Lyon"));

    server
        .delete(&format!("/api/v1/users/{id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&format!("/api/v1/users/{id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_not_found();
    server
        .get(&format!("/api/v1/users/{id}"))
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_create_user_error_statuses() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);

    let response = server
        .post("/api/v1/users")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"email": "x@example.org", "given_name": "", "family_name": "", "password": "pw"}))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "validation_failed");
    assert!(
        body["errors"]
            .as_array()
            .unwrap()
            .contains(&json!("role is required"))
    );

    create_user(&server, &admin, "dup@example.org", "2").await;
    server
        .post("/api/v1/users")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&new_user("dup@example.org", "2"))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_unknown_user_is_not_found() {
    let ctx = test_context().await;
    let admin = admin_token(&ctx.resources);
    let mut update = new_user("ghost@example.org", "2");
    update["id"] = json!("missing");
    server(&ctx)
        .put("/api/v1/users/missing")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&update)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_registration_and_approval_flow() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);

    let response = server
        .post("/api/v1/users/register")
        .json(&json!({
            "email": "a@b.com",
            "given_name": "A",
            "family_name": "B",
            "password": "x",
            "role": "1",
            "status": "active",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let registered: UserDto = response.json();
    assert_eq!(registered.role.as_deref(), Some("2"));
    assert!(registered.lockout_enabled);

    let pending: Vec<UserDto> = server
        .get("/api/v1/users/pending")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(pending.len(), 1);

    let response = server
        .post("/api/v1/users/approve")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"ids": ["missing", registered.id.unwrap()]}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["approved"], 1);

    let pending: Vec<UserDto> = server
        .get("/api/v1/users/pending")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert!(pending.is_empty());
    assert_eq!(ctx.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);
    create_user(&server, &admin, "forgot@example.org", "2").await;

    server
        .post("/api/v1/users/forgotpassword")
        .json(&json!({"email": "unknown@example.org"}))
        .await
        .assert_status_not_found();
    server
        .post("/api/v1/users/forgotpassword")
        .json(&json!({"email": "forgot@example.org"}))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let token = reset_token_from(&ctx.mailer.sent()[0]);
    let body = json!({
        "email": "forgot@example.org",
        "password": "brand-new",
        "confirm_password": "brand-new",
    });

    let forged = server
        .post("/api/v1/users/resetpassword")
        .add_query_param("token", "forged")
        .json(&body)
        .await;
    forged.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error: Value = forged.json();
    assert_eq!(error["errors"], json!(["Invalid token."]));
    server
        .post("/api/v1/users/resetpassword")
        .add_query_param("token", &token)
        .json(&body)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    // A redeemed link cannot be used a second time.
    server
        .post("/api/v1/users/resetpassword")
        .add_query_param("token", &token)
        .json(&body)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    server
        .post("/api/v1/users/resetpassword")
        .add_query_param("token", &token)
        .json(&json!({
            "email": "nobody@example.org",
            "password": "p",
            "confirm_password": "p",
        }))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_change_password_is_limited_to_owner() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);
    let created = create_user(&server, &admin, "owner@example.org", "2").await;
    let id = created.id.unwrap();
    let owner = user_token(&ctx.resources, &id, Role::Reporter);
    let stranger = user_token(&ctx.resources, "someone-else", Role::Reporter);
    let path = format!("/api/v1/users/{id}/changepassword");

    server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&stranger))
        .json(&json!({"current_password": "pw", "new_password": "next"}))
        .await
        .assert_status_forbidden();

    let response = server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&owner))
        .json(&json!({"current_password": "wrong", "new_password": "next"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["errors"], json!(["Incorrect password."]));

    server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&owner))
        .json(&json!({"current_password": "pw", "new_password": "next"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .put("/api/v1/users/missing/changepassword")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&json!({"current_password": "pw", "new_password": "next"}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);
    let created = create_user(&server, &admin, "me@example.org", "2").await;
    let id = created.id.unwrap();
    let owner = user_token(&ctx.resources, &id, Role::Reporter);
    let path = format!("/api/v1/users/{id}/profile");

    server
        .put(&path)
        .add_header(AUTHORIZATION, bearer(&owner))
        .json(&json!({"given_name": "Grace", "family_name": "Hopper", "city": "Arlington"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get(&path)
        .add_header(AUTHORIZATION, bearer(&owner))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["given_name"], "Grace");
    assert_eq!(body["city"], "Arlington");
    assert_eq!(body["email"], "me@example.org");

    server
        .get("/api/v1/users/missing/profile")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_not_found();
}

// =============================================================================
// Client registry
// =============================================================================

#[tokio::test]
async fn test_client_crud() {
    let ctx = test_context().await;
    let server = server(&ctx);
    let admin = admin_token(&ctx.resources);
    let client = json!({
        "client_id": "svc",
        "client_name": "Reporting service",
        "allowed_grant_types": ["client_credentials"],
        "allowed_scopes": ["reports"],
        "client_secrets": ["s3cret"],
    });

    let response = server
        .post("/api/clients")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&client)
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["client_id"], "svc");
    assert!(body.get("client_secrets").is_none());

    server
        .post("/api/clients")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&client)
        .await
        .assert_status(StatusCode::CONFLICT);

    let mut renamed = client.clone();
    renamed["client_name"] = json!("Renamed");
    server
        .put("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&renamed)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["client_name"], "Renamed");

    let list: Vec<Value> = server
        .get("/api/clients")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .json();
    assert_eq!(list.len(), 1);

    server
        .delete("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_not_found();
    server
        .delete("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_not_found();
    server
        .put("/api/clients/svc")
        .add_header(AUTHORIZATION, bearer(&admin))
        .json(&renamed)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_client_create_without_body_is_bad_request() {
    let ctx = test_context().await;
    let admin = admin_token(&ctx.resources);
    server(&ctx)
        .post("/api/clients")
        .add_header(AUTHORIZATION, bearer(&admin))
        .await
        .assert_status_bad_request();
}
