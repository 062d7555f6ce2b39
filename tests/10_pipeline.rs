mod common;

use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use common::{assert_envelope, TestServer};
use linkmetur_api::types::{RoleLevel, TenantId};

#[tokio::test]
async fn unauthenticated_contacts_request_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.client.get(server.url("/contacts")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await?;
    assert_envelope(&body);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unauthenticated");
    assert_eq!(body["path"], "/contacts");
    Ok(())
}

#[tokio::test]
async fn health_is_fast_and_public() -> Result<()> {
    let server = TestServer::spawn().await?;

    // Warm the connection pool before timing
    server.client.get(server.url("/health")).send().await?;

    let started = Instant::now();
    let res = server.client.get(server.url("/health")).send().await?;
    let elapsed = started.elapsed();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "linkmetur-api");
    assert!(elapsed < Duration::from_millis(100), "health took {:?}", elapsed);
    Ok(())
}

#[tokio::test]
async fn malformed_and_expired_tokens_look_the_same() -> Result<()> {
    let server = TestServer::spawn().await?;
    let expired = server.expired_token(TenantId::new_v4());

    let mut bodies = Vec::new();
    for token in ["garbage.token.value", expired.as_str()] {
        let res = server.get("/contacts", token).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let mut body: Value = res.json().await?;
        body.as_object_mut().unwrap().remove("timestamp");
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    Ok(())
}

#[tokio::test]
async fn every_response_is_an_envelope() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let responses = vec![
        server.client.get(server.url("/")).send().await?,
        server.client.get(server.url("/health")).send().await?,
        server.get("/contacts", &token).send().await?,
        server.get("/contacts/not-a-uuid", &token).send().await?,
        server.get(&format!("/contacts/{}", uuid::Uuid::new_v4()), &token).send().await?,
        server.get("/no/such/route", &token).send().await?,
        server
            .post("/contacts", &token)
            .header("content-type", "application/json")
            .body("{broken")
            .send()
            .await?,
        server.delete("/jobs/00000000-0000-0000-0000-000000000000", &token).send().await?,
    ];

    for res in responses {
        let status = res.status();
        let body: Value = res.json().await?;
        assert_envelope(&body);
        assert_eq!(body["success"].as_bool(), Some(status.is_success()), "{}: {}", status, body);
        if !status.is_success() {
            assert!(body["error"].is_string());
            assert!(body["message"].is_string());
        }
    }
    Ok(())
}

#[tokio::test]
async fn insufficient_role_is_forbidden() -> Result<()> {
    let server = TestServer::spawn().await?;
    let member = server.token(TenantId::new_v4(), RoleLevel::MEMBER);

    let res = server
        .post("/jobs", &member)
        .json(&serde_json::json!({ "title": "Boat captain" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Forbidden");
    Ok(())
}

#[tokio::test]
async fn cors_is_allow_listed() -> Result<()> {
    let mut config = common::test_config();
    config.security.cors_origins = vec!["https://app.linkmetur.com".to_string()];
    let server = TestServer::spawn_with(config).await?;

    let allowed = server
        .client
        .get(server.url("/health"))
        .header("origin", "https://app.linkmetur.com")
        .send()
        .await?;
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://app.linkmetur.com"
    );
    assert_eq!(allowed.headers()["access-control-allow-credentials"], "true");

    let other = server
        .client
        .get(server.url("/health"))
        .header("origin", "https://elsewhere.example")
        .send()
        .await?;
    assert!(other.headers().get("access-control-allow-origin").is_none());
    assert!(other.headers().get("access-control-allow-credentials").is_none());
    Ok(())
}
