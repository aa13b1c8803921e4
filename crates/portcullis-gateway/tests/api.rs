//! End-to-end tests of the gateway routes over a temporary RocksDB store.

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestResponse, TestServer};
use base64::prelude::*;
use secrecy::SecretString;
use serde_json::{json, Value};
use tempfile::TempDir;

use portcullis_auth::{testing, AuthConfig, RsaJwtService, API_KEY_ID, STANDALONE_KEY_ID};
use portcullis_control::{AccessKeyService, StoreUserDirectory};
use portcullis_core::ScopeSet;
use portcullis_gateway::bootstrap::{self, LoginMode, SigningKeys};
use portcullis_gateway::{create_router, GatewayConfig, GatewayState};
use portcullis_store::RocksStore;

const ACCESS_KEYS: &str = "/api/v1/accesskeys";

struct Harness {
    server: TestServer,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path().join("db")).unwrap());

    let users = StoreUserDirectory::new(Arc::clone(&store));
    for (name, scopes) in [("admin", "adm"), ("reader", "adm.read"), ("jane", "ipam")] {
        users
            .put_user(
                name.parse().unwrap(),
                Some(&SecretString::new("changeit".to_string())),
                ScopeSet::from_claim(scopes),
            )
            .unwrap();
    }

    let keys = SigningKeys {
        access_keys: Arc::new(RsaJwtService::new(API_KEY_ID, testing::rsa_key(0)).unwrap()),
        standalone_login: Arc::new(
            RsaJwtService::new(STANDALONE_KEY_ID, testing::rsa_key(1)).unwrap(),
        ),
    };
    let config = AuthConfig {
        basic_auth_enabled: true,
        ..AuthConfig::default()
    };
    let auth = bootstrap::assemble(
        Arc::new(config),
        Arc::clone(&store),
        &keys,
        LoginMode::Standalone,
    )
    .unwrap();
    let access_keys = Arc::new(AccessKeyService::new(
        store,
        Arc::new(keys.access_key_codec().unwrap()),
    ));

    let state = GatewayState::new(access_keys, Arc::new(auth), GatewayConfig::default());
    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        _dir: dir,
    }
}

fn basic(request: TestRequest, user: &str) -> TestRequest {
    let credentials = BASE64_STANDARD.encode(format!("{user}:changeit"));
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {credentials}")).unwrap(),
    )
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn set_cookies(response: &TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn create_key(h: &Harness, name: &str, scopes: &[&str]) -> Value {
    let response = basic(h.server.post(ACCESS_KEYS), "admin")
        .json(&json!({ "accesskey_name": name, "scopes": scopes }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["login"], "standalone");
    assert_eq!(body["credentials"], serde_json::json!(["bearer", "cookie", "basic"]));
}

#[tokio::test]
async fn jwks_publishes_local_keys() {
    let h = harness();
    let jwks: Value = h.server.get("/api/v1/.well-known/jwks.json").await.json();

    let mut kids: Vec<_> = jwks["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["kid"].as_str().unwrap().to_string())
        .collect();
    kids.sort();
    assert_eq!(kids, [API_KEY_ID, STANDALONE_KEY_ID]);
}

#[tokio::test]
async fn login_and_sso_settings_are_published() {
    let h = harness();

    let config: Value = h.server.get("/api/v1/login/config").await.json();
    assert_eq!(config["oidc_enabled"], false);
    assert_eq!(config["login_view"], "/ui/login/login.html");

    let settings: Value = h.server.get("/api/v1/sso/settings").await.json();
    assert_eq!(
        settings["jwks_uri"],
        "http://localhost:8080/api/v1/.well-known/jwks.json"
    );
}

// =============================================================================
// Authentication and authorization
// =============================================================================

#[tokio::test]
async fn anonymous_access_is_unauthorized_and_not_cached() {
    let h = harness();
    let response = h.server.get(ACCESS_KEYS).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = harness();
    let credentials = BASE64_STANDARD.encode("admin:wrong");
    let response = h
        .server
        .get(ACCESS_KEYS)
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {credentials}")).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn read_scope_can_list_but_not_create() {
    let h = harness();

    basic(h.server.get(ACCESS_KEYS), "reader")
        .await
        .assert_status_ok();

    let response = basic(h.server.post(ACCESS_KEYS), "reader")
        .json(&json!({ "accesskey_name": "ci-pipeline" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unrelated_scope_is_forbidden() {
    let h = harness();
    let response = basic(h.server.get(ACCESS_KEYS), "jane").await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "forbidden");
}

// =============================================================================
// Access keys
// =============================================================================

#[tokio::test]
async fn access_key_authenticates_until_renewed() {
    let h = harness();
    let issued = create_key(&h, "ci-pipeline", &["adm"]).await;
    let old_token = issued["access_key"].as_str().unwrap().to_string();
    let key_id = issued["key_id"].as_str().unwrap().to_string();

    let listed: Value = bearer(h.server.get(ACCESS_KEYS), &old_token).await.json();
    assert_eq!(listed[0]["name"], "ci-pipeline");

    let renewed: Value = basic(
        h.server.post(&format!("{ACCESS_KEYS}/{key_id}/_renew")),
        "admin",
    )
    .await
    .json();
    let new_token = renewed["access_key"].as_str().unwrap();
    assert_ne!(renewed["key_id"], issued["key_id"]);

    bearer(h.server.get(ACCESS_KEYS), new_token)
        .await
        .assert_status_ok();
    let response = bearer(h.server.get(ACCESS_KEYS), &old_token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn removed_access_key_is_revoked() {
    let h = harness();
    let issued = create_key(&h, "ci-pipeline", &["adm"]).await;
    let token = issued["access_key"].as_str().unwrap();
    let key_id = issued["key_id"].as_str().unwrap();

    let response = basic(h.server.delete(&format!("{ACCESS_KEYS}/{key_id}")), "admin").await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = bearer(h.server.get(ACCESS_KEYS), token).await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = basic(h.server.get(&format!("{ACCESS_KEYS}/{key_id}")), "admin").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_key_name_conflicts() {
    let h = harness();
    create_key(&h, "ci-pipeline", &[]).await;
    let response = basic(h.server.post(ACCESS_KEYS), "admin")
        .json(&json!({ "accesskey_name": "ci-pipeline" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_filters_by_name() {
    let h = harness();
    create_key(&h, "ci-pipeline", &[]).await;
    create_key(&h, "backup", &[]).await;

    let listed: Value = basic(h.server.get(ACCESS_KEYS), "admin")
        .add_query_param("filter", "pipe")
        .await
        .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "ci-pipeline");
}

#[tokio::test]
async fn description_is_replaced_by_text_body() {
    let h = harness();
    let issued = create_key(&h, "ci-pipeline", &[]).await;
    let key_id = issued["key_id"].as_str().unwrap();
    let path = format!("{ACCESS_KEYS}/{key_id}/description");

    let updated: Value = basic(h.server.put(&path), "admin")
        .text("Nightly deployments")
        .await
        .json();
    assert_eq!(updated["description"], "Nightly deployments");

    let fetched: Value = basic(h.server.get(&format!("{ACCESS_KEYS}/{key_id}")), "admin")
        .await
        .json();
    assert_eq!(fetched["description"], "Nightly deployments");
}

#[tokio::test]
async fn validate_and_restore_a_removed_key() {
    let h = harness();
    let issued = create_key(&h, "ci-pipeline", &["adm"]).await;
    let token = issued["access_key"].as_str().unwrap();
    let key_id = issued["key_id"].as_str().unwrap();

    let status: Value = basic(h.server.post(&format!("{ACCESS_KEYS}/_validate")), "admin")
        .text(token)
        .await
        .json();
    assert_eq!(status["valid"], true);

    basic(h.server.delete(&format!("{ACCESS_KEYS}/{key_id}")), "admin").await;
    let status: Value = basic(h.server.post(&format!("{ACCESS_KEYS}/_validate")), "admin")
        .text(token)
        .await
        .json();
    assert_eq!(status["valid"], false);

    let response = basic(h.server.post(&format!("{ACCESS_KEYS}/_restore")), "admin")
        .text(token)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["key_id"], key_id);

    bearer(h.server.get(ACCESS_KEYS), token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn garbage_token_is_unprocessable() {
    let h = harness();
    let response = basic(h.server.post(&format!("{ACCESS_KEYS}/_validate")), "admin")
        .text("not-a-token")
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_key_id_is_bad_request() {
    let h = harness();
    let response = basic(h.server.get(&format!("{ACCESS_KEYS}/nope")), "admin").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Standalone login
// =============================================================================

#[tokio::test]
async fn login_cookie_authenticates_and_logout_clears_it() {
    let h = harness();
    let response = h
        .server
        .post("/api/v1/login/_login")
        .json(&json!({ "user_name": "admin", "password": "changeit" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["user_name"], "admin");

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Max-Age=3600"));
    let cookie = cookies[0].split(';').next().unwrap().to_string();

    h.server
        .get(ACCESS_KEYS)
        .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
        .await
        .assert_status_ok();

    let response = h.server.get("/api/v1/login/_logout").await;
    response.assert_status_ok();
    let cleared = set_cookies(&response);
    assert!(cleared[0].starts_with("LEITSTAND_ACCESS=;"));
    assert!(cleared[0].contains("Max-Age=0"));
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let h = harness();
    let response = h
        .server
        .post("/api/v1/login/_login")
        .json(&json!({ "user_name": "admin", "password": "wrong" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn forged_cookie_is_unauthorized() {
    let h = harness();
    let response = h
        .server
        .get(ACCESS_KEYS)
        .add_header(
            HeaderName::from_static("cookie"),
            HeaderValue::from_static("LEITSTAND_ACCESS=forged"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_ignores_a_stale_cookie() {
    let h = harness();
    let response = h
        .server
        .post("/api/v1/login/_login")
        .add_header(header::COOKIE, HeaderValue::from_static("LEITSTAND_ACCESS=stale"))
        .json(&json!({ "user_name": "jane", "password": "changeit" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["scopes"], json!(["ipam"]));
}
