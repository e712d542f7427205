#![allow(clippy::unwrap_used)]
// Integration tests for `RestIdentityProvider` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devwatch_api::{Error, IdentityEndpoints, IdentityProvider, RestIdentityProvider};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestIdentityProvider) {
    let server = MockServer::start().await;
    let endpoints = IdentityEndpoints {
        accounts_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
        token_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
    };
    let provider = RestIdentityProvider::with_client(
        reqwest::Client::new(),
        endpoints,
        SecretString::from("api-key".to_string()),
    );
    (server, provider)
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

async fn mount_sign_in(server: &MockServer, local_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .and(query_param("key", "api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": local_id,
            "email": "ana@example.com",
            "idToken": "id-1",
            "refreshToken": "refresh-1"
        })))
        .mount(server)
        .await;
}

// ── Sign-in tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_sign_in_creates_session() {
    let (server, provider) = setup().await;
    mount_sign_in(&server, "u-1").await;

    assert!(provider.current_user().await.is_none());

    let user = provider
        .sign_in("ana@example.com", &secret("hunter22"))
        .await
        .unwrap();

    assert_eq!(user.user_id, "u-1");
    assert_eq!(provider.current_user().await, Some(user));
    assert_eq!(
        provider.refresh_token().await.unwrap().expose_secret(),
        "refresh-1"
    );
}

#[tokio::test]
async fn test_sign_in_failure_carries_provider_code() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "EMAIL_NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    let err = provider
        .sign_in("nobody@example.com", &secret("x"))
        .await
        .unwrap_err();

    assert_eq!(err.identity_code(), Some("EMAIL_NOT_FOUND"));
    assert!(provider.current_user().await.is_none());
}

#[tokio::test]
async fn test_provider_code_is_split_from_description() {
    let (server, provider) = setup().await;
    mount_sign_in(&server, "u-1").await;
    provider.sign_in("ana@example.com", &secret("pw")).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-2",
            "refresh_token": "refresh-2",
            "user_id": "u-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:update"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "WEAK_PASSWORD : Password should be at least 6 characters"
            }
        })))
        .mount(&server)
        .await;

    let err = provider.change_password(&secret("123")).await.unwrap_err();
    assert_eq!(err.identity_code(), Some("WEAK_PASSWORD"));
}

// ── Token tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_token_without_session_is_none() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(provider.fresh_token().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fresh_token_always_refreshes() {
    let (server, provider) = setup().await;
    mount_sign_in(&server, "u-1").await;
    provider.sign_in("ana@example.com", &secret("pw")).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-fresh",
            "refresh_token": "refresh-2",
            "user_id": "u-1"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let first = provider.fresh_token().await.unwrap().unwrap();
    let second = provider.fresh_token().await.unwrap().unwrap();

    assert_eq!(first.expose_secret(), "id-fresh");
    assert_eq!(second.expose_secret(), "id-fresh");
    assert_eq!(
        provider.refresh_token().await.unwrap().expose_secret(),
        "refresh-2"
    );
}

#[tokio::test]
async fn test_sign_out_clears_session() {
    let (server, provider) = setup().await;
    mount_sign_in(&server, "u-1").await;
    provider.sign_in("ana@example.com", &secret("pw")).await.unwrap();

    provider.sign_out().await;

    assert!(provider.current_user().await.is_none());
    assert!(provider.fresh_token().await.unwrap().is_none());
}

// ── Account tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_reauthenticate_rejects_other_user() {
    let (server, provider) = setup().await;
    mount_sign_in(&server, "u-2").await;

    // Seed a session for u-1 through restore.
    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-r",
            "refresh_token": "refresh-r",
            "user_id": "u-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "email": "ana@example.com" }]
        })))
        .mount(&server)
        .await;

    provider.restore(secret("persisted")).await.unwrap();
    let err = provider.reauthenticate(&secret("pw")).await.unwrap_err();

    assert!(
        matches!(err, Error::Identity { ref code, .. } if code == "USER_MISMATCH"),
        "expected USER_MISMATCH, got: {err:?}"
    );
}

#[tokio::test]
async fn test_restore_recovers_user_and_email() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(body_string_contains("refresh_token=persisted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-r",
            "refresh_token": "refresh-r",
            "user_id": "u-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{ "email": "ana@example.com" }]
        })))
        .mount(&server)
        .await;

    let user = provider.restore(secret("persisted")).await.unwrap();

    assert_eq!(user.user_id, "u-1");
    assert_eq!(user.email.as_deref(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_send_password_reset() {
    let (server, provider) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts:sendOobCode"))
        .and(body_string_contains("PASSWORD_RESET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "ana@example.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    provider
        .send_password_reset("ana@example.com")
        .await
        .unwrap();
}
