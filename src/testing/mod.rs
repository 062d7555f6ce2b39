//! Shared fixtures for unit tests: configuration, token minting and
//! response decoding.

use axum::{body::to_bytes, response::Response};
use chrono::Duration;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{Claims, Principal, TokenIssuer, TokenValidator};
use crate::config::AppConfig;
use crate::types::{RoleLevel, TenantId};

pub const TEST_SECRET: &str = "linkmetur-unit-test-secret";

/// Development preset with a fixed secret and a limiter loose enough that
/// tests not about rate limiting never trip it
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.rate_limit.max_requests = 10_000;
    config
}

pub fn validator() -> TokenValidator {
    TokenValidator::new(TEST_SECRET, 0).expect("test validator")
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(TEST_SECRET, Duration::hours(1)).expect("test issuer")
}

pub fn token(tenant: TenantId, role: RoleLevel) -> String {
    issuer().issue(Uuid::new_v4(), tenant, role).expect("token")
}

/// A correctly signed token whose expiry is well in the past
pub fn expired_token(tenant: TenantId) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4(),
        corp_id: tenant.0,
        role_level: RoleLevel::ADMIN.0,
        iat: now - 7200,
        exp: now - 3600,
    };
    issuer().encode_claims(&claims).expect("token")
}

pub fn principal(tenant: TenantId, role: RoleLevel) -> Principal {
    validator().validate(&token(tenant, role)).expect("principal")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
