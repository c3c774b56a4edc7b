//! End-to-end tests against a running gateway.

use std::time::Duration;

use edge_gateway::config::LimiterConfig;
use serde_json::Value;

mod common;

use common::{client, mint, set_cookies, start_gateway, test_config, with_provider};

#[tokio::test]
async fn test_health_reports_wiring() {
    let gateway = start_gateway(test_config()).await;

    let res = client().get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider_configured"], false);
    assert_eq!(body["upstream_configured"], false);
    assert_eq!(body["protection_rules"], 3);
    assert_eq!(body["limiters"].as_array().unwrap().len(), 3);

    gateway.stop().await;
}

#[tokio::test]
async fn test_mint_sets_cookie_and_returns_token() {
    let gateway = start_gateway(test_config()).await;

    let res = client().get(gateway.url("/api/csrf")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["cache-control"], "no-store");

    let cookies = set_cookies(&res);
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert!(cookie.starts_with("csrf_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=86400"));
    // Development mode: no Secure attribute.
    assert!(!cookie.contains("Secure"));

    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(cookie.starts_with(&format!("csrf_token={};", token)));

    gateway.stop().await;
}

#[tokio::test]
async fn test_protected_post_is_forwarded_with_rate_limit_headers() {
    let upstream = common::start_echo_upstream().await;
    let mut config = test_config();
    config.upstream.url = Some(format!("http://{}", upstream));
    let gateway = start_gateway(config).await;
    let client = client();

    let (cookie, token) = mint(&client, &gateway).await;
    let res = client
        .post(gateway.url("/api/contact?source=footer"))
        .header("cookie", &cookie)
        .header("x-csrf-token", &token)
        .header("x-request-id", "req-42")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-ratelimit-limit"], "10");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "9");
    assert!(res.headers().contains_key("x-ratelimit-reset"));
    assert_eq!(res.headers()["x-request-id"], "req-42");

    let echoed: Value = res.json().await.unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/contact");
    assert_eq!(echoed["query"], "source=footer");
    assert_eq!(echoed["body"], "hello");
    assert_eq!(echoed["x_request_id"], "req-42");
    assert_eq!(echoed["x_forwarded_for"], "127.0.0.1");

    gateway.stop().await;
}

#[tokio::test]
async fn test_forged_or_missing_token_is_rejected() {
    let upstream = common::start_echo_upstream().await;
    let mut config = test_config();
    config.upstream.url = Some(format!("http://{}", upstream));
    let gateway = start_gateway(config).await;
    let client = client();

    let (cookie, token) = mint(&client, &gateway).await;
    let mut tampered = token.clone().into_bytes();
    tampered[0] = if tampered[0] == b'a' { b'b' } else { b'a' };
    let tampered = String::from_utf8(tampered).unwrap();

    let res = client
        .post(gateway.url("/api/messages"))
        .header("cookie", &cookie)
        .header("x-csrf-token", &tampered)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_csrf_token");

    let res = client
        .post(gateway.url("/api/messages"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .post(gateway.url("/api/messages"))
        .header("x-csrf-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    // Safe methods are not checked.
    let res = client.get(gateway.url("/api/messages")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    gateway.stop().await;
}

#[tokio::test]
async fn test_rate_limit_rejects_after_limit() {
    let upstream = common::start_echo_upstream().await;
    let mut config = test_config();
    config.upstream.url = Some(format!("http://{}", upstream));
    let gateway = start_gateway(config).await;
    let client = client();
    let (cookie, token) = mint(&client, &gateway).await;

    let login = |forwarded_for: &'static str| {
        client
            .post(gateway.url("/api/login"))
            .header("cookie", &cookie)
            .header("x-csrf-token", &token)
            .header("x-forwarded-for", forwarded_for)
            .send()
    };

    for expected_remaining in (0..5).rev() {
        let res = login("198.51.100.7").await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers()["x-ratelimit-remaining"],
            expected_remaining.to_string().as_str()
        );
    }

    let res = login("198.51.100.7").await.unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(res.headers()["x-ratelimit-limit"], "5");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 900);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["remaining"], 0);
    assert!(body["reset_at"].as_u64().unwrap() > 0);

    // Another client has its own window.
    let res = login("203.0.113.9").await.unwrap();
    assert_eq!(res.status(), 200);

    // Another limiter is unaffected.
    let res = client
        .post(gateway.url("/api/contact"))
        .header("cookie", &cookie)
        .header("x-csrf-token", &token)
        .header("x-forwarded-for", "198.51.100.7")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    gateway.stop().await;
}

#[tokio::test]
async fn test_rate_limit_window_resets() {
    let upstream = common::start_echo_upstream().await;
    let mut config = test_config();
    config.upstream.url = Some(format!("http://{}", upstream));
    config
        .limiters
        .insert("forms".into(), LimiterConfig::new(2, 1000));
    let gateway = start_gateway(config).await;
    let client = client();
    let (cookie, token) = mint(&client, &gateway).await;

    let post = || {
        client
            .post(gateway.url("/api/contact"))
            .header("cookie", &cookie)
            .header("x-csrf-token", &token)
            .send()
    };

    assert_eq!(post().await.unwrap().status(), 200);
    assert_eq!(post().await.unwrap().status(), 200);
    assert_eq!(post().await.unwrap().status(), 429);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(post().await.unwrap().status(), 200);

    gateway.stop().await;
}

#[tokio::test]
async fn test_forwarding_failures() {
    let gateway = start_gateway(test_config()).await;
    let res = client().get(gateway.url("/anything")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no_upstream");
    gateway.stop().await;

    let slow = common::start_slow_upstream(Duration::from_secs(3)).await;
    let mut config = test_config();
    config.upstream.url = Some(format!("http://{}", slow));
    config.timeouts.upstream_secs = 1;
    let gateway = start_gateway(config).await;
    let res = client().get(gateway.url("/slow")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "upstream_timeout");
    gateway.stop().await;
}

#[tokio::test]
async fn test_relay_without_provider_degrades() {
    let gateway = start_gateway(test_config()).await;

    let res = client()
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({
            "event": "SIGNED_IN",
            "access_token": "a",
            "refresh_token": "r",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(set_cookies(&res).is_empty());
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "ok": false, "event": "SIGNED_IN", "reason": "provider_unconfigured" })
    );

    gateway.stop().await;
}

#[tokio::test]
async fn test_relay_rejects_bad_payloads() {
    let gateway = start_gateway(test_config()).await;
    let client = client();

    let res = client
        .post(gateway.url("/api/auth/session"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "ok": false, "event": null, "reason": "invalid_payload" })
    );

    let res = client
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({ "event": "PASSWORD_RECOVERY" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "unknown_event");

    gateway.stop().await;
}

#[tokio::test]
async fn test_relay_signs_in_and_out_through_provider() {
    let (provider, calls) = common::start_mock_provider().await;
    let gateway = start_gateway(with_provider(test_config(), provider)).await;
    let client = client();

    let res = client
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({
            "event": "SIGNED_IN",
            "access_token": common::VALID_ACCESS_TOKEN,
            "refresh_token": "refresh-1",
        }))
        .send()
        .await
        .unwrap();
    let cookies = set_cookies(&res);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "ok": true, "event": "SIGNED_IN" }));
    assert_eq!(calls.user(), 1);
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with(&format!("sb-access-token={};", common::VALID_ACCESS_TOKEN)));
    assert!(cookies[1].starts_with("sb-refresh-token=refresh-1;"));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("SameSite=Lax")));

    let res = client
        .post(gateway.url("/api/auth/session"))
        .header(
            "cookie",
            format!("sb-access-token={}; sb-refresh-token=refresh-1", common::VALID_ACCESS_TOKEN),
        )
        .json(&serde_json::json!({ "event": "SIGNED_OUT" }))
        .send()
        .await
        .unwrap();
    let cookies = set_cookies(&res);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "ok": true, "event": "SIGNED_OUT" }));
    assert_eq!(calls.logout(), 1);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    gateway.stop().await;
}

#[tokio::test]
async fn test_relay_reports_provider_rejection_and_missing_tokens() {
    let (provider, calls) = common::start_mock_provider().await;
    let gateway = start_gateway(with_provider(test_config(), provider)).await;
    let client = client();

    let res = client
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({
            "event": "TOKEN_REFRESHED",
            "access_token": "expired",
            "refresh_token": "refresh-1",
        }))
        .send()
        .await
        .unwrap();
    assert!(set_cookies(&res).is_empty());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["event"], "TOKEN_REFRESHED");
    assert_eq!(body["reason"], "provider_error");

    let res = client
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({ "event": "SIGNED_IN", "access_token": "only-access" }))
        .send()
        .await
        .unwrap();
    assert!(set_cookies(&res).is_empty());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reason"], "missing_tokens");
    assert_eq!(calls.user(), 1);

    gateway.stop().await;
}

#[tokio::test]
async fn test_relay_refuses_tokens_that_would_inject_cookie_attributes() {
    let (provider, calls) = common::start_mock_provider().await;
    let gateway = start_gateway(with_provider(test_config(), provider)).await;

    let res = client()
        .post(gateway.url("/api/auth/session"))
        .json(&serde_json::json!({
            "event": "SIGNED_IN",
            "access_token": common::VALID_ACCESS_TOKEN,
            "refresh_token": "r; Domain=evil.example; Max-Age=999999999",
        }))
        .send()
        .await
        .unwrap();
    assert!(set_cookies(&res).is_empty());
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "ok": false, "event": "SIGNED_IN", "reason": "invalid_tokens" })
    );
    assert_eq!(calls.user(), 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_stop_closes_listener() {
    let gateway = start_gateway(test_config()).await;
    let url = gateway.url("/health");
    assert_eq!(client().get(&url).send().await.unwrap().status(), 200);

    gateway.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client().get(&url).send().await.is_err());
}
