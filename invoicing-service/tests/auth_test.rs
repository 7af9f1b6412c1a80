//! Account flows: sign-up, sign-in, refresh and profile.

mod common;

use axum::http::{Method, StatusCode};
use common::{sign_up_body, TestApp};
use serde_json::json;

#[tokio::test]
async fn sign_up_returns_token_pair() {
    let app = TestApp::new();

    let response = app
        .post(
            "/v1/public/auth/sign-up",
            None,
            sign_up_body("ada@example.com"),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 15 * 60);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new();
    app.sign_up("ada@example.com").await;

    let response = app
        .post(
            "/v1/public/auth/sign-up",
            None,
            sign_up_body("ada@example.com"),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"], "email already exists");
}

#[tokio::test]
async fn sign_up_validates_fields() {
    let app = TestApp::new();
    let mut body = sign_up_body("not-an-email");
    body["password"] = json!("123");

    let response = app.post("/v1/public/auth/sign-up", None, body).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn sign_in_checks_credentials() {
    let app = TestApp::new();
    app.sign_up("ada@example.com").await;

    let response = app
        .post(
            "/v1/public/auth/sign-in",
            None,
            json!({"email": "ada@example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.json()["access_token"].is_string());

    let response = app
        .post(
            "/v1/public/auth/sign-in",
            None,
            json!({"email": "ada@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post(
            "/v1/public/auth/sign-in",
            None,
            json!({"email": "nobody@example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_issues_new_pair() {
    let app = TestApp::new();
    let tokens = app
        .post(
            "/v1/public/auth/sign-up",
            None,
            sign_up_body("ada@example.com"),
        )
        .await
        .json();

    let response = app
        .post(
            "/v1/public/auth/refresh-token",
            None,
            json!({"refresh_token": tokens["refresh_token"]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let access = response.json()["access_token"].as_str().unwrap().to_string();
    assert_eq!(app.get("/v1/protected/me", &access).await.status, StatusCode::OK);

    // An access token is not accepted as a refresh token.
    let response = app
        .post(
            "/v1/public/auth/refresh-token",
            None,
            json!({"refresh_token": tokens["access_token"]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_access_token() {
    let app = TestApp::new();

    let response = app
        .request(Method::GET, "/v1/protected/invoices", None, None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/v1/protected/me", "garbage").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let tokens = app
        .post(
            "/v1/public/auth/sign-up",
            None,
            sign_up_body("ada@example.com"),
        )
        .await
        .json();
    let refresh = tokens["refresh_token"].as_str().unwrap();
    assert_eq!(
        app.get("/v1/protected/me", refresh).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn me_returns_profile_without_password_hash() {
    let app = TestApp::new();
    let token = app.sign_up("ada@example.com").await;

    let response = app.get("/v1/protected/me", &token).await;

    assert_eq!(response.status, StatusCode::OK);
    let me = response.json();
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["bank_name"], "First Engine Bank");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn update_me_applies_sparse_changes() {
    let app = TestApp::new();
    let token = app.sign_up("ada@example.com").await;
    app.sign_up("charles@example.com").await;

    let response = app
        .put("/v1/protected/me", &token, json!({"phone": "+44-20-9999"}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let me = response.json();
    assert_eq!(me["phone"], "+44-20-9999");
    assert_eq!(me["name"], "Ada Lovelace");

    let response = app
        .put(
            "/v1/protected/me",
            &token,
            json!({"email": "charles@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .put(
            "/v1/protected/me",
            &token,
            json!({"email": "ada.lovelace@example.com"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .post(
            "/v1/public/auth/sign-in",
            None,
            json!({"email": "ada.lovelace@example.com", "password": "secret123"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}
