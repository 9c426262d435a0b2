use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use quizgate_api::app::{AppServices, build_app};
use quizgate_client::{ApiClient, ClientConfig, ClientError, Credentials};
use quizgate_core::DeviceId;
use quizgate_infra::AuthConfig;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let services = AppServices::in_memory(&AuthConfig::for_tests()).expect("services");
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            handle,
        }
    }

    async fn register(&self, username: &str) {
        let res = reqwest::Client::new()
            .post(format!("{}/api/v1/account/register", self.base_url))
            .json(&json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn config(srv: &TestServer, device: &str) -> ClientConfig {
    ClientConfig::new(&srv.base_url, DeviceId::parse(device).unwrap())
}

/// Replace the cached access credential with one the server will reject.
fn break_access_token(client: &ApiClient) {
    let current = client.credentials().current().unwrap();
    client.credentials().set(Credentials {
        access_token: "not-a-credential".to_string(),
        ..current
    });
}

#[tokio::test]
async fn login_and_call_protected_route() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let client = ApiClient::new(config(&srv, "laptop")).unwrap();

    let creds = client.login("alice", "password123").await.unwrap();
    assert_eq!(creds.username, "alice");

    let me: Value = client.get_json("/api/v1/session/me").await.unwrap();
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let client = ApiClient::new(config(&srv, "laptop")).unwrap();

    let err = client.login("alice", "nope-nope-nope").await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Unauthorized {
            code: "invalid_login".to_string()
        }
    );
    assert!(client.credentials().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_access_refreshes_once_for_a_burst() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let client = ApiClient::new(config(&srv, "laptop")).unwrap();
    let before = client.login("alice", "password123").await.unwrap();
    break_access_token(&client);

    // The server rotates on every refresh, so a second refresh with the old
    // token would be rejected as a replay and fail some of these calls.
    let calls: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get_json::<Value>("/api/v1/session/me").await })
        })
        .collect();
    for call in calls {
        let me = call.await.unwrap().unwrap();
        assert_eq!(me["username"], "alice");
    }

    let after = client.credentials().current().unwrap();
    assert_ne!(after.refresh_token, before.refresh_token);
}

#[tokio::test]
async fn revoked_session_requires_reauth_and_fires_hook_once() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let phone = ApiClient::with_reauth_hook(config(&srv, "phone"), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    phone.login("alice", "password123").await.unwrap();

    // Another device logs the phone out.
    let laptop = ApiClient::new(config(&srv, "laptop")).unwrap();
    laptop.login("alice", "password123").await.unwrap();
    let res = reqwest::Client::new()
        .delete(format!("{}/api/v1/session/devices/phone", srv.base_url))
        .bearer_auth(laptop.credentials().access_token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);

    break_access_token(&phone);
    let err = phone.get_json::<Value>("/api/v1/session/me").await.unwrap_err();
    assert_eq!(err, ClientError::ReauthRequired);
    assert!(phone.credentials().is_empty());

    let err = phone.get_json::<Value>("/api/v1/session/me").await.unwrap_err();
    assert_eq!(err, ClientError::ReauthRequired);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn logout_clears_credentials() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let client = ApiClient::new(config(&srv, "laptop")).unwrap();
    let creds = client.login("alice", "password123").await.unwrap();

    client.logout().await.unwrap();
    assert!(client.credentials().is_empty());
    assert_eq!(
        client.get_json::<Value>("/api/v1/session/me").await.unwrap_err(),
        ClientError::ReauthRequired
    );

    let res = reqwest::Client::new()
        .post(format!("{}/api/v1/account/refresh", srv.base_url))
        .json(&json!({ "refresh_token": creds.refresh_token, "device_id": "laptop" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_auth_errors_pass_through_without_refresh() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let client = ApiClient::new(config(&srv, "laptop")).unwrap();
    let creds = client.login("alice", "password123").await.unwrap();

    let path = format!("/api/v1/resources/{}/access?mode=read", quizgate_core::ResourceId::new());
    let err = client
        .send_json::<_, Value>(reqwest::Method::GET, &path, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));
    assert_eq!(client.credentials().current().unwrap(), creds);
}

#[tokio::test]
async fn logout_revokes_only_its_own_device_even_with_url_characters() {
    let srv = TestServer::spawn().await;
    srv.register("alice").await;
    let odd = ApiClient::new(config(&srv, "phone?x")).unwrap();
    let plain = ApiClient::new(config(&srv, "phone")).unwrap();
    let odd_creds = odd.login("alice", "password123").await.unwrap();
    let plain_creds = plain.login("alice", "password123").await.unwrap();

    odd.logout().await.unwrap();

    let refresh = |token: String, device: &'static str| {
        reqwest::Client::new()
            .post(format!("{}/api/v1/account/refresh", srv.base_url))
            .json(&json!({ "refresh_token": token, "device_id": device }))
            .send()
    };
    let res = refresh(odd_creds.refresh_token, "phone?x").await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    let res = refresh(plain_creds.refresh_token, "phone").await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
}
