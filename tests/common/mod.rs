#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use marketplace_session::{AuthenticatedClient, Config, MemoryTokenStore, StoreKey, TokenStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const REFRESH_PATH: &str = "/api/auth/refresh-token";

pub fn full_session() -> Vec<(StoreKey, &'static str)> {
    vec![
        (StoreKey::AccessToken, "at1"),
        (StoreKey::RefreshToken, "rt1"),
        (StoreKey::Token, "at1"),
        (StoreKey::UserInfo, r#"{"name":"ada"}"#),
        (StoreKey::Roles, r#"["admin"]"#),
    ]
}

pub fn store_with(entries: &[(StoreKey, &str)]) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_entries(entries.iter().copied()))
}

pub fn client(config: &Config, store: Arc<MemoryTokenStore>) -> AuthenticatedClient {
    AuthenticatedClient::new(config, store).expect("client builds")
}

pub fn config(server: &MockServer) -> Config {
    Config::from_values(server.uri(), None, None, Some(2_000), None)
}

pub fn assert_cleared(store: &dyn TokenStore) {
    for key in StoreKey::ALL {
        assert_eq!(store.get(key).unwrap(), None, "{key} should have been cleared");
    }
}

pub fn refresh_ok(access: &str, refresh: Option<&str>, delay: Duration) -> ResponseTemplate {
    let mut result = serde_json::json!({ "accessToken": access });
    if let Some(refresh) = refresh {
        result["refreshToken"] = serde_json::Value::String(refresh.to_string());
    }
    ResponseTemplate::new(200)
        .set_body_json(serde_json::json!({ "result": result }))
        .set_delay(delay)
}

/// Answers 401 to `stale_token` and 200 with `body` to anything else.
pub async fn mount_protected(server: &MockServer, verb: &str, route: &str, stale_token: &str, body: serde_json::Value) {
    let stale = format!("Bearer {stale_token}");
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(move |req: &Request| {
            let auth = req
                .headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();
            if auth == stale || auth.is_empty() {
                ResponseTemplate::new(401).set_body_string("token expired")
            } else {
                ResponseTemplate::new(200).set_body_json(body.clone())
            }
        })
        .mount(server)
        .await;
}

pub async fn requests_to(server: &MockServer, route: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|req| req.url.path() == route)
        .collect()
}

pub fn bearer(req: &Request) -> Option<String> {
    req.headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}
