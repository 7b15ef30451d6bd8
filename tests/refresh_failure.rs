mod common;

use std::time::Duration;

use marketplace_session::{
    Config, Error, ExpiryReason, RefreshState, SessionEvent, StoreKey, TokenStore,
};
use tokio::sync::broadcast::error::TryRecvError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    REFRESH_PATH, assert_cleared, client, config, full_session, mount_protected, refresh_ok, requests_to,
    store_with,
};

#[tokio::test]
async fn transport_failure_rejects_every_waiter_and_signals_once() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/credits", "at1", serde_json::json!([])).await;
    // slower than the client's request timeout
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let config = Config::from_values(server.uri(), None, Some(400), Some(5_000), None);
    let client = client(&config, store.clone());
    let mut events = client.subscribe();

    let a = {
        let client = client.clone();
        tokio::spawn(async move { client.get_json::<serde_json::Value>("/api/credits").await })
    };
    let b = {
        let client = client.clone();
        tokio::spawn(async move { client.get_json::<serde_json::Value>("/api/credits").await })
    };

    for handle in [a, b] {
        match handle.await.unwrap() {
            Err(Error::RefreshFailed(inner)) => {
                assert!(matches!(*inner, Error::Transport(_)), "unexpected cause {inner}")
            }
            other => panic!("expected Error::RefreshFailed, got {:?}", other),
        }
    }

    assert_cleared(&*store);
    match events.try_recv() {
        Ok(SessionEvent::Expired {
            reason: ExpiryReason::RefreshFailed(_),
        }) => {}
        other => panic!("expected a refresh-failed expiry, got {:?}", other),
    }
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    let coordinator = client.coordinator();
    assert_eq!(coordinator.state(), RefreshState::Idle);
    assert_eq!(coordinator.pending(), 0);
}

#[tokio::test]
async fn refresh_timeout_is_a_refresh_failure() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/subscriptions", "at1", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let config = Config::from_values(server.uri(), None, None, Some(200), None);
    let client = client(&config, store.clone());
    let mut events = client.subscribe();

    let err = client
        .get_json::<serde_json::Value>("/api/subscriptions")
        .await
        .expect_err("hung refresh must not hang the caller");
    match err {
        Error::RefreshFailed(inner) => {
            assert!(matches!(*inner, Error::RefreshTimeout(d) if d == Duration::from_millis(200)))
        }
        other => panic!("expected Error::RefreshFailed, got {:?}", other),
    }
    assert!(err_is_signalled(&mut events));
    assert_cleared(&*store);
    assert_eq!(client.coordinator().state(), RefreshState::Idle);
}

#[tokio::test]
async fn malformed_refresh_payload_ends_session() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/withdrawals", "at1", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "result": { "refreshToken": "rt2" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let client = client(&config(&server), store.clone());
    let mut events = client.subscribe();

    let err = client
        .get_json::<serde_json::Value>("/api/withdrawals")
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
    match err {
        Error::RefreshFailed(inner) => assert!(matches!(*inner, Error::RefreshMalformed(_))),
        other => panic!("expected Error::RefreshFailed, got {:?}", other),
    }
    assert!(err_is_signalled(&mut events));
    assert_cleared(&*store);
}

#[tokio::test]
async fn rejected_refresh_token_ends_session() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/wallets", "at1", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let client = client(&config(&server), store.clone());

    let err = client.get_json::<serde_json::Value>("/api/wallets").await.unwrap_err();
    match err {
        Error::RefreshFailed(inner) => match &*inner {
            Error::Status { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "refresh token revoked");
            }
            other => panic!("unexpected cause {other}"),
        },
        other => panic!("expected Error::RefreshFailed, got {:?}", other),
    }
    assert_cleared(&*store);
}

#[tokio::test]
async fn missing_refresh_token_short_circuits() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/blogs", "at1", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_with(&[
        (StoreKey::AccessToken, "at1"),
        (StoreKey::Token, "at1"),
        (StoreKey::UserInfo, "{}"),
    ]);
    let client = client(&config(&server), store.clone());
    let mut events = client.subscribe();

    let err = client.get_json::<serde_json::Value>("/api/blogs").await.unwrap_err();
    match err {
        Error::AuthExpired { status, body } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(body, "token expired");
        }
        other => panic!("expected Error::AuthExpired, got {:?}", other),
    }
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Expired {
            reason: ExpiryReason::MissingRefreshToken
        }
    );
    assert_cleared(&*store);
    assert!(requests_to(&server, REFRESH_PATH).await.is_empty());
}

#[tokio::test]
async fn forced_refresh_without_refresh_token_is_auth_expired() {
    let server = MockServer::start().await;
    let store = store_with(&[]);
    let client = client(&config(&server), store);

    let err = client.coordinator().refresh().await.unwrap_err();
    assert!(matches!(err, Error::AuthExpired { .. }));
}

fn err_is_signalled(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> bool {
    matches!(
        events.try_recv(),
        Ok(SessionEvent::Expired {
            reason: ExpiryReason::RefreshFailed(_)
        })
    ) && matches!(events.try_recv(), Err(TryRecvError::Empty))
}

#[tokio::test]
async fn aborted_leader_still_settles_queued_requests() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/credits", "at1", serde_json::json!({ "ok": true })).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(refresh_ok("at2", Some("rt2"), Duration::from_millis(400)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let client = client(&config(&server), store.clone());
    let coordinator = client.coordinator();

    let leader = {
        let client = client.clone();
        tokio::spawn(async move { client.get_json::<serde_json::Value>("/api/credits").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.state(), RefreshState::Refreshing);

    let follower = {
        let client = client.clone();
        tokio::spawn(async move { client.get_json::<serde_json::Value>("/api/credits").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.pending(), 1);

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    let body = follower.await.unwrap().expect("queued request completes");
    assert_eq!(body["ok"], true);
    assert_eq!(coordinator.state(), RefreshState::Idle);
    assert_eq!(coordinator.pending(), 0);
    assert_eq!(store.get(StoreKey::AccessToken).unwrap().as_deref(), Some("at2"));
}

#[tokio::test]
async fn refresh_timeout_rejects_every_queued_request() {
    let server = MockServer::start().await;
    mount_protected(&server, "GET", "/api/subscriptions", "at1", serde_json::json!([])).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with(&full_session());
    let config = Config::from_values(server.uri(), None, None, Some(400), None);
    let client = client(&config, store.clone());
    let coordinator = client.coordinator();
    let mut events = client.subscribe();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_json::<serde_json::Value>("/api/subscriptions").await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.pending(), 2);

    for handle in handles {
        match handle.await.unwrap() {
            Err(Error::RefreshFailed(inner)) => {
                assert!(matches!(*inner, Error::RefreshTimeout(d) if d == Duration::from_millis(400)))
            }
            other => panic!("expected Error::RefreshFailed, got {:?}", other),
        }
    }

    assert_eq!(coordinator.pending(), 0);
    assert_eq!(coordinator.state(), RefreshState::Idle);
    assert!(err_is_signalled(&mut events));
    assert_cleared(&*store);
}
