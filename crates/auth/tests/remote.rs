use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use http::HeaderMap;
use http::header;
use lai_auth::{IdentityGate, RemoteConfig, RemoteIdentity};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const API_KEY: &str = "anon-test-key";
const GOOD_TOKEN: &str = "remote-access-token";

#[derive(Clone, Default)]
struct Provider {
    logouts: Arc<AtomicUsize>,
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers
        .get("apikey")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == API_KEY)
}

fn bearer_is_good(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", GOOD_TOKEN))
}

async fn token(
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !has_api_key(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
    }
    let email = body.get("email").and_then(|v| v.as_str()).unwrap_or("");
    let password = body.get("password").and_then(|v| v.as_str()).unwrap_or("");
    if email == "down@kemenkeu.go.id" {
        return (StatusCode::BAD_GATEWAY, Json(serde_json::json!({})));
    }
    if email != "admin@kemenkeu.go.id" || password != "rahasia" {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid_grant"})),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "access_token": GOOD_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "ignored",
            "user": {"id": "user-1", "email": email}
        })),
    )
}

async fn user(headers: HeaderMap) -> (StatusCode, Json<serde_json::Value>) {
    if !has_api_key(&headers) || !bearer_is_good(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"id": "user-1", "email": "admin@kemenkeu.go.id"})),
    )
}

async fn logout(State(provider): State<Provider>, headers: HeaderMap) -> StatusCode {
    if !bearer_is_good(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    provider.logouts.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn spawn_provider(provider: Provider) -> (SocketAddr, oneshot::Sender<()>) {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/logout", post(logout))
        .with_state(provider);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (addr, shutdown_tx)
}

fn gate(base_url: String) -> IdentityGate {
    RemoteIdentity::new(RemoteConfig {
        base_url,
        api_key: API_KEY.to_string(),
        timeout: Duration::from_secs(2),
    })
    .expect("remote identity should init")
    .into()
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token)
            .parse()
            .expect("authorization header must parse"),
    );
    headers
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_sign_in_session_and_sign_out() {
    let provider = Provider::default();
    let (addr, shutdown) = spawn_provider(provider.clone()).await;
    let gate = gate(format!("http://{}/", addr));
    assert_eq!(gate.mode(), "remote");

    let session = gate
        .sign_in("admin@kemenkeu.go.id", "rahasia")
        .await
        .expect("sign in should succeed");
    assert_eq!(session.user_id, "user-1");
    assert_eq!(session.access_token, GOOD_TOKEN);
    assert!(session.expires_at.is_some());

    let resolved = gate
        .current_session(&bearer(GOOD_TOKEN))
        .await
        .expect("token should validate")
        .expect("session should be present");
    assert_eq!(resolved.email, "admin@kemenkeu.go.id");

    let err = gate
        .current_session(&bearer("stale"))
        .await
        .expect_err("unknown token must be rejected");
    assert_eq!(err.code, "ERR_AUTH_INVALID");

    gate.sign_out(&session).await.expect("sign out should succeed");
    assert_eq!(provider.logouts.load(Ordering::SeqCst), 1);

    let _ = shutdown.send(());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_failures_map_to_login_failed_or_unavailable() {
    let (addr, shutdown) = spawn_provider(Provider::default()).await;
    let gate = gate(format!("http://{}", addr));

    let err = gate
        .sign_in("admin@kemenkeu.go.id", "salah")
        .await
        .expect_err("bad password must fail");
    assert_eq!(err.code, "ERR_LOGIN_FAILED");
    assert_eq!(err.message, "Login gagal");

    let err = gate
        .sign_in("down@kemenkeu.go.id", "rahasia")
        .await
        .expect_err("provider error must fail");
    assert_eq!(err.code, "ERR_AUTH_UNAVAILABLE");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_provider_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");
    drop(listener);

    let err = gate(format!("http://{}", addr))
        .current_session(&bearer(GOOD_TOKEN))
        .await
        .expect_err("closed port must fail");
    assert_eq!(err.code, "ERR_AUTH_UNAVAILABLE");
}
