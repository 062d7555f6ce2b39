#![allow(dead_code)]

use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::Duration;
use serde_json::Value;
use uuid::Uuid;

use linkmetur_api::auth::{Claims, TokenIssuer};
use linkmetur_api::config::AppConfig;
use linkmetur_api::types::{RoleLevel, TenantId};
use linkmetur_api::Components;

pub const TEST_SECRET: &str = "linkmetur-integration-secret";

/// Development preset with a known secret and a generous limiter
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.rate_limit.max_requests = 10_000;
    config
}

/// A live server on a free local port, running the full pipeline in-process
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
    issuer: TokenIssuer,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let issuer = TokenIssuer::new(&config.security.jwt_secret, Duration::hours(1))?;
        let router = linkmetur_api::build(config, Components::in_memory())?;

        // Bound before spawning, so requests queue until the server accepts
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind {}", base_url))?;
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        Ok(Self {
            port,
            base_url,
            client: reqwest::Client::new(),
            issuer,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, tenant: TenantId, role: RoleLevel) -> String {
        self.token_for(Uuid::new_v4(), tenant, role)
    }

    pub fn token_for(&self, user: Uuid, tenant: TenantId, role: RoleLevel) -> String {
        self.issuer.issue(user, tenant, role).expect("token")
    }

    /// Signed with the right key but expired an hour ago
    pub fn expired_token(&self, tenant: TenantId) -> String {
        let now = chrono::Utc::now().timestamp();
        self.issuer
            .encode_claims(&Claims {
                sub: Uuid::new_v4(),
                corp_id: tenant.0,
                role_level: RoleLevel::ADMIN.0,
                iat: now - 7200,
                exp: now - 3600,
            })
            .expect("token")
    }

    pub fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn patch(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }
}

/// Assert the fields every envelope carries
pub fn assert_envelope(body: &Value) {
    assert!(body["success"].is_boolean(), "missing boolean success: {}", body);
    let timestamp = body["timestamp"].as_str().expect("timestamp string");
    assert!(
        chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(),
        "timestamp not ISO-8601: {}",
        timestamp
    );
}

pub fn id_of(body: &Value) -> String {
    body["data"]["id"].as_str().expect("data.id").to_string()
}
