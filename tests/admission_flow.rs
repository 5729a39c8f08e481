//! End-to-end admission tests against a running guard.

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{start_guard, test_config};

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let guard = start_guard(test_config()).await;
    let res = guard.client.get(guard.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_login_and_me() {
    let guard = start_guard(test_config()).await;
    let (access, _) = guard.login("alice", "alice-pw").await;

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-limit"], "100");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "99");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user_id"], "alice");
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn test_me_requires_token() {
    let guard = start_guard(test_config()).await;
    let res = guard.client.get(guard.url("/api/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_failed_login_locks_account() {
    let guard = start_guard(test_config()).await;
    let res = guard
        .client
        .post(guard.url("/api/auth/login"))
        .json(&json!({ "user_id": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Correct password is refused while the lock holds.
    let res = guard
        .client
        .post(guard.url("/api/auth/login"))
        .json(&json!({ "user_id": "alice", "password": "alice-pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["retry_after_seconds"], retry);
}

#[tokio::test]
async fn test_inactive_account_cannot_log_in() {
    let guard = start_guard(test_config()).await;
    let res = guard
        .client
        .post(guard.url("/api/auth/login"))
        .json(&json!({ "user_id": "bob", "password": "bob-pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_tokens() {
    let guard = start_guard(test_config()).await;
    let (access, refresh) = guard.login("alice", "alice-pw").await;

    let res = guard
        .client
        .post(guard.url("/api/auth/logout"))
        .bearer_auth(&access)
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(guard.persistence.revoked_count(), 1);

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = guard
        .client
        .post(guard.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_session() {
    let guard = start_guard(test_config()).await;
    let (_, refresh) = guard.login("alice", "alice-pw").await;

    let res = guard
        .client
        .post(guard.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_ne!(body["data"]["refresh_token"], refresh.as_str());

    // The old refresh token was consumed.
    let res = guard
        .client
        .post(guard.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_limit_rejects_with_retry_after() {
    let mut config = test_config();
    config.user_rate_limit.api = 3;
    let guard = start_guard(config).await;
    let (access, _) = guard.login("alice", "alice-pw").await;

    for _ in 0..3 {
        let res = guard
            .client
            .get(guard.url("/api/me"))
            .bearer_auth(&access)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["data"]["retry_after_seconds"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_ip_limit_applies_to_anonymous_traffic() {
    let mut config = test_config();
    config.ip_rate_limit.auth_requests_per_window = 2;
    let guard = start_guard(config).await;

    for _ in 0..2 {
        let res = guard
            .client
            .get(guard.url("/api/auth/otp/status?phone=555"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = guard
        .client
        .get(guard.url("/api/auth/otp/status?phone=555"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_otp_send_verify_and_cooldown() {
    let guard = start_guard(test_config()).await;
    let phone = "+15550001";

    let res = guard
        .client
        .post(guard.url("/api/auth/otp/send"))
        .json(&json!({ "phone": phone }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["retry_after_seconds"], 60);

    // Second send inside the first interval is refused.
    let res = guard
        .client
        .post(guard.url("/api/auth/otp/send"))
        .json(&json!({ "phone": phone }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let code = guard.otp.code_for(phone).unwrap();
    let res = guard
        .client
        .post(guard.url("/api/auth/otp/verify"))
        .json(&json!({ "phone": phone, "code": code }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Verification resets the schedule.
    let res = guard
        .client
        .get(guard.url(&format!("/api/auth/otp/status?phone={}", "%2B15550001")))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["retry_after_seconds"], 0);
}

#[tokio::test]
async fn test_webhook_limit_and_whitelist() {
    let mut config = test_config();
    config.webhook.max_requests = 1;
    let guard = start_guard(config).await;

    let res = guard
        .client
        .post(guard.url("/webhooks/payments"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = guard
        .client
        .post(guard.url("/webhooks/payments"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let mut config = test_config();
    config.webhook.max_requests = 1;
    config.webhook.whitelist = vec!["127.0.0.1/32".to_string()];
    let guard = start_guard(config).await;
    for _ in 0..3 {
        let res = guard
            .client
            .post(guard.url("/webhooks/payments"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let guard = start_guard(test_config()).await;
    let (user_access, _) = guard.login("alice", "alice-pw").await;
    let (admin_access, _) = guard.login("root", "root-pw").await;

    let res = guard
        .client
        .get(guard.url("/api/admin/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = guard
        .client
        .get(guard.url("/api/admin/status"))
        .bearer_auth(&user_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = guard
        .client
        .get(guard.url("/api/admin/status"))
        .bearer_auth(&admin_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["shared_store"], false);
}

#[tokio::test]
async fn test_admin_unlocks_account() {
    let guard = start_guard(test_config()).await;
    let (admin_access, _) = guard.login("root", "root-pw").await;

    guard
        .client
        .post(guard.url("/api/auth/login"))
        .json(&json!({ "user_id": "alice", "password": "wrong" }))
        .send()
        .await
        .unwrap();

    let res = guard
        .client
        .delete(guard.url("/api/admin/lockouts/alice"))
        .bearer_auth(&admin_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    guard.login("alice", "alice-pw").await;
}

#[tokio::test]
async fn test_admin_revokes_access_token() {
    let guard = start_guard(test_config()).await;
    let (admin_access, _) = guard.login("root", "root-pw").await;
    let (user_access, _) = guard.login("alice", "alice-pw").await;

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth(&user_access)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["user_id"], "alice");

    let jti = {
        use base64::Engine;
        let payload = user_access.split('.').nth(1).unwrap();
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .unwrap();
        let claims: Value = serde_json::from_slice(&bytes).unwrap();
        claims["jti"].as_str().unwrap().to_string()
    };

    let res = guard
        .client
        .post(guard.url("/api/admin/revocations"))
        .bearer_auth(&admin_access)
        .json(&json!({ "jti": jti }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = guard
        .client
        .get(guard.url("/api/me"))
        .bearer_auth(&user_access)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
