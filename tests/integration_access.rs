//! Access control integration tests
//!
//! Tests route protection over HTTP including:
//! - Token presence, signature and scheme checks
//! - Permission and role guards
//! - Optional authentication on public routes
//! - The response envelope for malformed requests

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Test 1: protected routes reject missing, foreign-scheme and tampered tokens
#[tokio::test]
async fn test_token_checks() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/users/profile", addr);

    let (_, token) = register_and_login(&client, addr, "tok@example.com", "citizen").await;

    let missing = client.get(&url).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["message"], "No token provided, authorization denied");

    let basic = client
        .get(&url)
        .header("Authorization", format!("Basic {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(basic.status(), StatusCode::UNAUTHORIZED);
    let body: Value = basic.json().await.unwrap();
    assert_eq!(body["message"], "No token provided, authorization denied");

    let mut tampered = token.clone().into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = client.get(&url).bearer_auth(&tampered).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");

    let ok = client.get(&url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["data"]["email"], "tok@example.com");
}

/// Test 2: user lookup needs view_users; admin passes with no permissions
#[tokio::test]
async fn test_permission_guard() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state.clone()).await;
    let client = reqwest::Client::new();

    let (citizen_id, citizen_token) =
        register_and_login(&client, addr, "cit@example.com", "citizen").await;
    let (police_id, police_token) =
        register_and_login(&client, addr, "cop@example.com", "police").await;
    let (admin_id, _) = register_and_login(&client, addr, "adm@example.com", "ngo").await;
    promote_to_admin(&state, &admin_id).await;
    let (_, body) = login(&client, addr, "adm@example.com", PASSWORD, false).await;
    let admin_token = body["data"]["token"].as_str().unwrap().to_string();

    let denied = client
        .get(format!("http://{}/api/users/{}", addr, police_id))
        .bearer_auth(&citizen_token)
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    let body: Value = denied.json().await.unwrap();
    assert_eq!(body["message"], "Permission 'view_users' required");

    let police = client
        .get(format!("http://{}/api/users/{}", addr, citizen_id))
        .bearer_auth(&police_token)
        .send()
        .await
        .unwrap();
    assert_eq!(police.status(), StatusCode::FORBIDDEN);

    let admin = client
        .get(format!("http://{}/api/users/{}", addr, citizen_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::OK);
    let body: Value = admin.json().await.unwrap();
    assert_eq!(body["data"]["email"], "cit@example.com");
    assert!(body["data"].get("password_hash").is_none());
}

/// Test 3: the admin route is closed to every other role
#[tokio::test]
async fn test_role_guard() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    let (target_id, _) = register_and_login(&client, addr, "t@example.com", "citizen").await;

    for (email, role) in [
        ("p@example.com", "police"),
        ("d@example.com", "dci"),
        ("i@example.com", "investigator"),
    ] {
        let (_, token) = register_and_login(&client, addr, email, role).await;

        let response = client
            .put(format!("http://{}/api/admin/users/{}/status", addr, target_id))
            .bearer_auth(&token)
            .json(&json!({ "status": "suspended" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "role {}", role);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Insufficient permissions");
    }
}

/// Test 4: the greeting personalizes only for a live session
#[tokio::test]
async fn test_optional_auth_greeting() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/api/public/greeting", addr);

    let (_, token) = register_and_login(&client, addr, "hi@example.com", "ngo").await;

    let anonymous: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(anonymous["data"]["authenticated"], false);

    let known: Value = client
        .get(&url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(known["data"]["authenticated"], true);
    assert_eq!(known["data"]["user"]["email"], "hi@example.com");

    client
        .post(format!("http://{}/api/auth/logout", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let logged_out = client.get(&url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(logged_out.status(), StatusCode::OK);
    let body: Value = logged_out.json().await.unwrap();
    assert_eq!(body["data"]["authenticated"], false);
}

/// Test 5: malformed bodies get the envelope with field errors
#[tokio::test]
async fn test_malformed_requests() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    let broken = client
        .post(format!("http://{}/api/auth/login", addr))
        .header("Content-Type", "application/json")
        .body("{\"email\":")
        .send()
        .await
        .unwrap();
    assert_eq!(broken.status(), StatusCode::BAD_REQUEST);
    let body: Value = broken.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"].as_array().is_some_and(|e| !e.is_empty()));

    let missing_fields = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&json!({ "email": "not-an-email", "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_fields.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing_fields.json().await.unwrap();
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

/// Test 6: health and unknown routes
#[tokio::test]
async fn test_health_and_not_found() {
    let state = create_test_state().await;
    let (addr, _shutdown) = run_test_server(state).await;
    let client = reqwest::Client::new();

    for path in ["/health", "/api/health"] {
        let response = client
            .get(format!("http://{}{}", addr, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["cache"]["backend"], "memory");
    }

    let missing = client
        .get(format!("http://{}/api/cases", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
}
