//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use casegate::app::build_state;
use casegate::config::{Config, ServerConfig};
use casegate::database::SqliteDatabase;
use casegate::server::{AppState, Server};
use casegate::telemetry::AuthMetrics;
use serde_json::{json, Value};
use tokio::sync::oneshot;

pub const PASSWORD: &str = "Secur3!pass";

/// Configuration over in-memory SQLite and the in-process cache
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "integration-secret-0123456789abcdef".to_string();
    config.auth.client_url = "http://portal.test".to_string();
    config.cache.backend = "memory".to_string();
    config.database.path = ":memory:".to_string();
    // Flows below register and log in several accounts from one address.
    config.rate_limit.auth.max_requests = 100;
    config
}

/// Create a test application state
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    create_test_state_with(test_config()).await
}

pub async fn create_test_state_with(config: Config) -> AppState<SqliteDatabase> {
    build_state(&config, Arc::new(AuthMetrics::noop()))
        .await
        .expect("Failed to build test state")
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(state: AppState<SqliteDatabase>) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server = Server::new(ServerConfig::default(), state);

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}

/// Register an account and return the response body
pub async fn register(
    client: &reqwest::Client,
    addr: SocketAddr,
    email: &str,
    role: &str,
) -> (reqwest::StatusCode, Value) {
    let response = client
        .post(format!("http://{}/api/auth/register", addr))
        .json(&json!({
            "email": email,
            "password": PASSWORD,
            "firstName": "Test",
            "lastName": "Person",
            "role": role
        }))
        .send()
        .await
        .expect("register request failed");

    let status = response.status();
    (status, response.json().await.expect("register body"))
}

/// Log in and return the response body
pub async fn login(
    client: &reqwest::Client,
    addr: SocketAddr,
    email: &str,
    password: &str,
    remember_me: bool,
) -> (reqwest::StatusCode, Value) {
    let response = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&json!({
            "email": email,
            "password": password,
            "rememberMe": remember_me
        }))
        .send()
        .await
        .expect("login request failed");

    let status = response.status();
    (status, response.json().await.expect("login body"))
}

/// Register, log in and return `(user id, token)`
pub async fn register_and_login(
    client: &reqwest::Client,
    addr: SocketAddr,
    email: &str,
    role: &str,
) -> (String, String) {
    let (status, body) = register(client, addr, email, role).await;
    assert_eq!(status, 201, "registration failed: {}", body);

    let (status, body) = login(client, addr, email, PASSWORD, false).await;
    assert_eq!(status, 200, "login failed: {}", body);

    (
        body["data"]["user"]["id"].as_str().unwrap().to_string(),
        body["data"]["token"].as_str().unwrap().to_string(),
    )
}

/// Turn an account into an administrator directly in the store
pub async fn promote_to_admin(state: &AppState<SqliteDatabase>, id: &str) {
    let id = id.to_string();
    state
        .auth_manager
        .store()
        .with_connection(move |conn| {
            conn.execute(
                "UPDATE users SET role = 'admin', permissions = '[]' WHERE id = ?1",
                [id],
            )
        })
        .await
        .expect("Failed to promote user");
}

/// Pending verification token for an email, as stored at registration
pub async fn verification_token(state: &AppState<SqliteDatabase>, email: &str) -> Option<String> {
    let email = email.to_string();
    state
        .auth_manager
        .store()
        .with_connection(move |conn| {
            conn.query_row(
                "SELECT verification_token FROM users WHERE email = ?1",
                [email],
                |row| row.get(0),
            )
        })
        .await
        .expect("Failed to read verification token")
}
