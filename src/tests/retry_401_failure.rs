use crate::tests::test_support::{capture_logs, client_with, drain_logs};
use crate::{Error, StoreKey};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn returns_retry_exhausted_after_double_401() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/wallets/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "result": { "accessToken": "at2" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(
        &server.uri(),
        &[(StoreKey::AccessToken, "at1"), (StoreKey::RefreshToken, "rt1")],
    );

    let (lines, guard) = capture_logs();
    let res = client.get_json::<serde_json::Value>("/api/wallets/me").await;
    drop(guard);

    match res {
        Err(Error::RetryExhausted { status, body }) => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, "nope");
        }
        Err(other) => panic!("expected Error::RetryExhausted, got {}", other),
        Ok(_) => panic!("expected Error::RetryExhausted, got Ok"),
    }

    let logs = drain_logs(lines);
    let warn_count = logs
        .iter()
        .filter(|line| line.contains("WARN") && line.contains("401"))
        .count();
    assert_eq!(
        warn_count, 2,
        "should log a warning for each 401, got {:?}",
        logs
    );
}
