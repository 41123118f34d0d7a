//! Rate limiting integration tests
//!
//! Tests request throttling over HTTP including:
//! - The strict rule on login and registration
//! - The general rule on every API route
//! - Routes outside `/api` staying unthrottled

mod common;

use casegate::config::{RateLimitRuleConfig, RateLimitSettings};
use common::*;
use reqwest::StatusCode;
use serde_json::Value;

/// Test 1: five login attempts pass, the sixth gets 429 with Retry-After
#[tokio::test]
async fn test_login_rate_limit() {
    let mut config = test_config();
    config.rate_limit = RateLimitSettings::default();
    let state = create_test_state_with(config).await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    for attempt in 1..=5 {
        let (status, _) = login(&client, addr, "nobody@example.com", PASSWORD, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "attempt {}", attempt);
    }

    let response = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&serde_json::json!({"email": "nobody@example.com", "password": PASSWORD}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1 && retry_after <= 900);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Too many requests, please try again later");
}

/// Test 2: login and registration share the strict budget
#[tokio::test]
async fn test_auth_rule_shared_by_register_and_login() {
    let mut config = test_config();
    config.rate_limit.auth = RateLimitRuleConfig {
        window_secs: 900,
        max_requests: 2,
        fail_closed: true,
    };
    let state = create_test_state_with(config).await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    let (status, _) = register(&client, addr, "one@example.com", "citizen").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = login(&client, addr, "one@example.com", PASSWORD, false).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = register(&client, addr, "two@example.com", "citizen").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

/// Test 3: the general rule covers API routes but not the root health check
#[tokio::test]
async fn test_general_rate_limit() {
    let mut config = test_config();
    config.rate_limit.general = RateLimitRuleConfig {
        window_secs: 900,
        max_requests: 3,
        fail_closed: false,
    };
    let state = create_test_state_with(config).await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/public/greeting", addr);

    for remaining in ["2", "1", "0"] {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["ratelimit-limit"], "3");
        assert_eq!(response.headers()["ratelimit-remaining"], remaining);
    }

    let denied = client.get(&url).send().await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

/// Test 4: login responses report the stricter rule's headers
#[tokio::test]
async fn test_auth_rule_headers_win() {
    let mut config = test_config();
    config.rate_limit = RateLimitSettings::default();
    let state = create_test_state_with(config).await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&serde_json::json!({"email": "a@example.com", "password": "x"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["ratelimit-limit"], "5");
    assert_eq!(response.headers()["ratelimit-remaining"], "4");
}

/// Test 5: disabled throttling admits everything
#[tokio::test]
async fn test_rate_limit_disabled() {
    let mut config = test_config();
    config.rate_limit = RateLimitSettings {
        enabled: false,
        ..RateLimitSettings::default()
    };
    let state = create_test_state_with(config).await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    for _ in 0..8 {
        let (status, _) = login(&client, addr, "nobody@example.com", PASSWORD, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
