use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::types::{RoleLevel, TenantId};

/// JWT claims carried by every bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Tenant (corporation) id
    pub corp_id: Uuid,
    pub role_level: u8,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is malformed or its signature does not verify")]
    InvalidToken,

    #[error("token has expired")]
    Expired,

    #[error("JWT secret not configured")]
    SecretMissing,

    #[error("JWT generation error: {0}")]
    Encoding(String),
}

/// Authenticated identity decoded from a request's bearer token.
///
/// Built once by the token validator and read-only afterwards; every request
/// gets its own instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: Uuid,
    tenant_id: TenantId,
    role_level: RoleLevel,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn role_level(&self) -> RoleLevel {
        self.role_level
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl TryFrom<Claims> for Principal {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or(AuthError::InvalidToken)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::InvalidToken)?;

        Ok(Self {
            user_id: claims.sub,
            tenant_id: TenantId(claims.corp_id),
            role_level: RoleLevel(claims.role_level),
            issued_at,
            expires_at,
        })
    }
}

/// Verifies bearer tokens against the fixed HS256 key. Stateless.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str, leeway_secs: u64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::SecretMissing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        Self::new(&security.jwt_secret, security.jwt_leeway_secs)
    }

    /// Validate a raw token (scheme prefix already stripped) into a principal
    pub fn validate(&self, raw_token: &str) -> Result<Principal, AuthError> {
        let token_data = decode::<Claims>(raw_token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            }
        })?;

        Principal::try_from(token_data.claims)
    }
}

/// Mints tokens with the same key the validator checks
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::SecretMissing);
        }

        Ok(Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            expiry,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        Self::new(&security.jwt_secret, security.jwt_expiry())
    }

    pub fn issue(&self, user_id: Uuid, tenant_id: TenantId, role: RoleLevel) -> Result<String, AuthError> {
        let now = Utc::now();
        self.encode_claims(&Claims {
            sub: user_id,
            corp_id: tenant_id.0,
            role_level: role.0,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }
}
