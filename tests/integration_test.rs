// Integration tests for Hostel Client
//
// These tests drive the secure client against a mock backend and verify
// the token refresh pipeline end to end: single-flight refresh, queued
// request release, session invalidation and the typed API layer on top.

use mockito::{Matcher, Mock, Server};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use hostel_client::{
    api,
    auth::{
        gate::Entry, CredentialPolicy, CredentialStore, MemoryStore, Session, SqliteStore,
        ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    },
    config::Config,
    error::{ClientError, RefreshError},
    http_client::{SecureClient, SessionEvent},
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

/// Client over a fresh in-memory store seeded with the given tokens
fn create_client(
    server: &Server,
    access: Option<&str>,
    refresh: Option<&str>,
) -> (SecureClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref(), access, refresh);

    let client = SecureClient::new(&Config::with_base_url(server.url()), store.clone())
        .expect("Failed to create secure client");
    (client, store)
}

fn seed(store: &dyn CredentialStore, access: Option<&str>, refresh: Option<&str>) {
    let policy = CredentialPolicy::default();
    if let Some(access) = access {
        store
            .set(ACCESS_TOKEN_KEY, access, policy.login_access())
            .unwrap();
    }
    if let Some(refresh) = refresh {
        store
            .set(REFRESH_TOKEN_KEY, refresh, policy.login_refresh())
            .unwrap();
    }
}

/// Resource that rejects `tok1` and serves `tok2`, one hit each
async fn mock_expiring_resource(server: &mut Server, path: &str) -> (Mock, Mock) {
    let rejected = server
        .mock("GET", path)
        .match_header("authorization", "tok1")
        .with_status(401)
        .with_body(json!({ "success": false, "message": "jwt expired" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let served = server
        .mock("GET", path)
        .match_header("authorization", "tok2")
        .with_status(200)
        .with_body(json!({ "success": true, "data": { "path": path } }).to_string())
        .expect(1)
        .create_async()
        .await;
    (rejected, served)
}

async fn mock_refresh_success(server: &mut Server) -> Mock {
    server
        .mock("POST", "/auth/refresh-token")
        .match_body(Matcher::Json(json!({ "refreshToken": "r1" })))
        .with_status(200)
        .with_body(json!({ "data": { "accessToken": "tok2" } }).to_string())
        .expect(1)
        .create_async()
        .await
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Wait until `count` requests are parked behind the refresh gate
async fn wait_for_queue(client: &SecureClient, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.gate().queued() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests never queued behind the refresh");
}

// ==================================================================================================
// Single-Flight Refresh Tests
// ==================================================================================================

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let mut server = Server::new_async().await;
    let (a_rejected, a_served) = mock_expiring_resource(&mut server, "/a").await;
    let (b_rejected, b_served) = mock_expiring_resource(&mut server, "/b").await;
    let (c_rejected, c_served) = mock_expiring_resource(&mut server, "/c").await;
    let refresh = mock_refresh_success(&mut server).await;

    let (client, store) = create_client(&server, Some("tok1"), Some("r1"));
    let mut events = client.subscribe();

    let (a, b, c) = tokio::join!(client.get("/a"), client.get("/b"), client.get("/c"));

    for response in [a, b, c] {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }

    refresh.assert_async().await;
    for mock in [a_rejected, a_served, b_rejected, b_served, c_rejected, c_served] {
        mock.assert_async().await;
    }

    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
    assert_eq!(drain(&mut events), vec![SessionEvent::TokenRefreshed]);
    assert!(!client.gate().is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_401s_share_one_refresh_across_threads() {
    for _ in 0..20 {
        let mut server = Server::new_async().await;
        let mut resources = Vec::new();
        for path in ["/a", "/b", "/c"] {
            resources.push(mock_expiring_resource(&mut server, path).await);
        }
        let refresh = mock_refresh_success(&mut server).await;

        let (client, store) = create_client(&server, Some("tok1"), Some("r1"));

        let handles: Vec<_> = ["/a", "/b", "/c"]
            .into_iter()
            .map(|path| {
                let client = client.clone();
                tokio::spawn(async move { client.get(path).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status(), StatusCode::OK);
        }

        refresh.assert_async().await;
        for (rejected, served) in resources {
            rejected.assert_async().await;
            served.assert_async().await;
        }
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok2"));
    }
}

#[tokio::test]
async fn test_queued_requests_resume_after_refresh_settles() {
    let mut server = Server::new_async().await;
    let replayed = Arc::new(Mutex::new(Vec::new()));
    let mut mocks = Vec::new();
    for path in ["/a", "/b", "/c"] {
        let rejected = server
            .mock("GET", path)
            .match_header("authorization", "tok1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let order = replayed.clone();
        let recorded = path.to_string();
        let served = server
            .mock("GET", path)
            .match_header("authorization", "tok2")
            .with_status(200)
            .with_body_from_request(move |_| {
                order.lock().unwrap().push(recorded.clone());
                b"{}".to_vec()
            })
            .expect(1)
            .create_async()
            .await;
        mocks.push((rejected, served));
    }
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .expect(0)
        .create_async()
        .await;

    let (client, store) = create_client(&server, Some("tok1"), Some("r1"));

    // Hold the refresh so every rejected request has to queue
    let lease = match client.gate().enter(Some("tok1"), Some("tok1")) {
        Entry::Lead(lease) => lease,
        _ => panic!("expected to lead the refresh"),
    };

    // Queue one at a time so arrival order is /a, /b, /c
    let mut handles = Vec::new();
    for (queued, path) in ["/a", "/b", "/c"].into_iter().enumerate() {
        let worker = client.clone();
        handles.push(tokio::spawn(async move { worker.get(path).await }));
        wait_for_queue(&client, queued + 1).await;
    }
    assert!(client.gate().is_refreshing());

    seed(store.as_ref(), Some("tok2"), None);
    let released = lease.settle(Ok("tok2".to_string()));
    assert_eq!(released.len(), 3);
    assert!(released.windows(2).all(|w| w[0] < w[1]));

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    refresh.assert_async().await;
    for (rejected, served) in mocks {
        rejected.assert_async().await;
        served.assert_async().await;
    }
    assert_eq!(*replayed.lock().unwrap(), vec!["/a", "/b", "/c"]);
    assert_eq!(client.gate().queued(), 0);
}

#[tokio::test]
async fn test_queued_requests_share_refresh_failure() {
    let mut server = Server::new_async().await;
    let mut resources = Vec::new();
    for path in ["/a", "/b"] {
        let mock = server
            .mock("GET", path)
            .match_header("authorization", "tok1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        resources.push(mock);
    }

    let (client, _store) = create_client(&server, Some("tok1"), Some("r1"));
    let lease = match client.gate().enter(Some("tok1"), Some("tok1")) {
        Entry::Lead(lease) => lease,
        _ => panic!("expected to lead the refresh"),
    };

    let handles: Vec<_> = ["/a", "/b"]
        .into_iter()
        .map(|path| {
            let client = client.clone();
            tokio::spawn(async move { client.get(path).await })
        })
        .collect();

    wait_for_queue(&client, 2).await;
    lease.settle(Err(RefreshError::Rejected {
        status: 401,
        message: "refresh token expired".to_string(),
    }));

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ClientError::Refresh(RefreshError::Rejected { status: 401, .. })
        ));
    }

    for mock in resources {
        mock.assert_async().await;
    }
}

// ==================================================================================================
// Refresh Failure Tests
// ==================================================================================================

#[tokio::test]
async fn test_refresh_failure_rejects_all_and_clears_session() {
    let mut server = Server::new_async().await;
    let mut resources = Vec::new();
    for path in ["/a", "/b", "/c"] {
        let mock = server
            .mock("GET", path)
            .match_header("authorization", "tok1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        resources.push(mock);
    }
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .with_status(401)
        .with_body(json!({ "success": false, "message": "refresh token expired" }).to_string())
        .expect(1)
        .create_async()
        .await;

    let (client, store) = create_client(&server, Some("tok1"), Some("r1"));
    let mut events = client.subscribe();

    let (a, b, c) = tokio::join!(client.get("/a"), client.get("/b"), client.get("/c"));

    // Leader, queued and late requests all report the same refresh failure
    for result in [a, b, c] {
        let err = result.unwrap_err();
        assert!(err.is_auth_failure(), "unexpected error: {}", err);
        assert!(matches!(
            err,
            ClientError::Refresh(RefreshError::Rejected { status: 401, .. })
        ));
    }

    refresh.assert_async().await;
    for mock in resources {
        mock.assert_async().await;
    }
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);

    let events = drain(&mut events);
    assert_eq!(events.len(), 1, "redirect fired more than once: {:?}", events);
    assert!(matches!(
        &events[0],
        SessionEvent::Invalidated { redirect_to, .. } if redirect_to == "/"
    ));
    assert!(!client.gate().is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_failure_redirects_once_across_threads() {
    for _ in 0..20 {
        let mut server = Server::new_async().await;
        let mut resources = Vec::new();
        for path in ["/a", "/b", "/c"] {
            let mock = server
                .mock("GET", path)
                .match_header("authorization", "tok1")
                .with_status(401)
                .expect(1)
                .create_async()
                .await;
            resources.push(mock);
        }
        let refresh = server
            .mock("POST", "/auth/refresh-token")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let (client, store) = create_client(&server, Some("tok1"), Some("r1"));
        let mut events = client.subscribe();

        let handles: Vec<_> = ["/a", "/b", "/c"]
            .into_iter()
            .map(|path| {
                let client = client.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    let result = client.get(path).await;
                    // Credentials are gone by the time any request gives up
                    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
                    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
                    result
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap_err().is_auth_failure());
        }

        refresh.assert_async().await;
        for mock in resources {
            mock.assert_async().await;
        }
        let invalidated = drain(&mut events)
            .into_iter()
            .filter(|event| matches!(event, SessionEvent::Invalidated { .. }))
            .count();
        assert_eq!(invalidated, 1);
    }
}

#[tokio::test]
async fn test_missing_refresh_token_skips_refresh_call() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/user/me")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .expect(0)
        .create_async()
        .await;

    let (client, store) = create_client(&server, Some("tok1"), None);
    let mut events = client.subscribe();

    let err = client.get("/user/me").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Refresh(RefreshError::MissingRefreshToken)
    ));

    refresh.assert_async().await;
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::Invalidated {
            redirect_to: "/".to_string(),
            reason: RefreshError::MissingRefreshToken.to_string(),
        }]
    );
}

#[tokio::test]
async fn test_replayed_request_rejected_again_is_unauthorized() {
    let mut server = Server::new_async().await;
    let resource = server
        .mock("GET", "/wallet/allUser/balance")
        .with_status(401)
        .with_body(json!({ "success": false, "message": "forbidden for this role" }).to_string())
        .expect(2)
        .create_async()
        .await;
    let refresh = mock_refresh_success(&mut server).await;

    let (client, store) = create_client(&server, Some("tok1"), Some("r1"));

    let err = client.get("/wallet/allUser/balance").await.unwrap_err();
    match err {
        ClientError::Unauthorized { message } => assert_eq!(message, "forbidden for this role"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }

    resource.assert_async().await;
    refresh.assert_async().await;
    // The refreshed credentials stay in place
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("tok2"));
}

#[tokio::test]
async fn test_request_after_refresh_uses_new_token() {
    let mut server = Server::new_async().await;
    let (rejected, served) = mock_expiring_resource(&mut server, "/a").await;
    let later = server
        .mock("GET", "/b")
        .match_header("authorization", "tok2")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let refresh = mock_refresh_success(&mut server).await;

    let (client, _store) = create_client(&server, Some("tok1"), Some("r1"));

    client.get("/a").await.unwrap();
    client.get("/b").await.unwrap();

    for mock in [rejected, served, later, refresh] {
        mock.assert_async().await;
    }
}

// ==================================================================================================
// Persistent Store Tests
// ==================================================================================================

#[tokio::test]
async fn test_refresh_persists_to_sqlite_store() {
    let mut server = Server::new_async().await;
    mock_expiring_resource(&mut server, "/profile").await;
    mock_refresh_success(&mut server).await;

    let dir = std::env::temp_dir().join(format!("hostel-client-it-{}", uuid::Uuid::new_v4()));
    let path = dir.join("credentials.sqlite3");

    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        seed(store.as_ref(), Some("tok1"), Some("r1"));
        let client = SecureClient::new(&Config::with_base_url(server.url()), store).unwrap();
        client.get("/profile").await.unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(
        reopened.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
        Some("tok2")
    );

    let _ = std::fs::remove_dir_all(dir);
}

// ==================================================================================================
// Session and API Tests
// ==================================================================================================

#[tokio::test]
async fn test_login_then_expired_token_recovers() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/user/me")
        .match_header("authorization", "tok1")
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": { "_id": "u1", "name": "Admin", "role": "admin" }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/buildings")
        .match_header("authorization", "tok1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let _mock = server
        .mock("GET", "/buildings")
        .match_header("authorization", "tok2")
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": [{ "_id": "b1", "name": "Block A" }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    mock_refresh_success(&mut server).await;

    let (client, _store) = create_client(&server, None, None);
    let session = Session::new(client.clone());
    let mut events = client.subscribe();

    let user = session.login("tok1", "r1").await.unwrap().unwrap();
    assert!(user.is_admin());

    let buildings = api::properties::buildings(&client).await.unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].name, "Block A");

    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedIn, SessionEvent::TokenRefreshed]
    );
}

#[tokio::test]
async fn test_api_errors_do_not_trigger_refresh() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/user/all")
        .with_status(500)
        .with_body(json!({ "success": false, "message": "Database unavailable" }).to_string())
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh-token")
        .expect(0)
        .create_async()
        .await;

    let (client, _store) = create_client(&server, Some("tok1"), Some("r1"));

    let err = api::users::all_users(&client).await.unwrap_err();
    assert!(!err.is_auth_failure());
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Database unavailable");
        }
        other => panic!("expected Api error, got {:?}", other),
    }

    refresh.assert_async().await;
}
