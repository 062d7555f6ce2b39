use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_SERVICE_NAME: &str = "linkmetur-api";

// Ceilings for env overrides. Cache TTL is also the worst-case staleness
// when an invalidation cannot reach the cache store.
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;
pub const MAX_CACHE_TTL_SECS: u64 = 10 * 60;
pub const MAX_JWT_EXPIRY_HOURS: u64 = 30 * 24;
pub const MAX_TIMEOUT_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service_name: String,
    pub port: u16,
    /// Deadline for everything downstream of the guard
    pub request_timeout_ms: u64,
    pub max_request_size_bytes: usize,
    pub sweep_interval_secs: u64,
}

/// How the limiter derives its key from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKeyMode {
    /// Client address only; every route shares one budget
    Ip,
    /// Client address plus route class (first path segment)
    IpRoute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u64,
    pub window_secs: u64,
    pub key_mode: RateLimitKeyMode,
    /// Use the proxy-appended (last) X-Forwarded-For hop as client address
    pub trust_forwarded: bool,
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub jwt_leeway_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.min(MAX_TIMEOUT_MS))
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs.clamp(1, MAX_WINDOW_SECS))
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms.min(MAX_TIMEOUT_MS))
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.min(MAX_CACHE_TTL_SECS))
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms.min(MAX_TIMEOUT_MS))
    }
}

impl SecurityConfig {
    pub fn jwt_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt_expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS) as i64)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVICE_NAME") {
            self.server.service_name = v;
        }
        if let Some(port) = env::var("LINKMETUR_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms = v.parse().unwrap_or(self.server.request_timeout_ms);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.server.max_request_size_bytes = v.parse().unwrap_or(self.server.max_request_size_bytes);
        }

        // Rate limit overrides
        if let Ok(v) = env::var("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = v.parse().unwrap_or(self.rate_limit.enabled);
        }
        if let Ok(v) = env::var("RATE_LIMIT_REQUESTS") {
            self.rate_limit.max_requests = v.parse().unwrap_or(self.rate_limit.max_requests);
        }
        if let Ok(v) = env::var("RATE_LIMIT_WINDOW_SECS") {
            self.rate_limit.window_secs = v.parse().unwrap_or(self.rate_limit.window_secs);
        }
        if let Ok(v) = env::var("RATE_LIMIT_KEY") {
            match v.as_str() {
                "ip" => self.rate_limit.key_mode = RateLimitKeyMode::Ip,
                "ip_route" => self.rate_limit.key_mode = RateLimitKeyMode::IpRoute,
                other => tracing::warn!("Ignoring unknown RATE_LIMIT_KEY '{}'", other),
            }
        }
        if let Ok(v) = env::var("RATE_LIMIT_TRUST_FORWARDED") {
            self.rate_limit.trust_forwarded = v.parse().unwrap_or(self.rate_limit.trust_forwarded);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_ENABLED") {
            self.cache.enabled = v.parse().unwrap_or(self.cache.enabled);
        }
        if let Ok(v) = env::var("CACHE_TTL_SECS") {
            self.cache.ttl_secs = v.parse().unwrap_or(self.cache.ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_OP_TIMEOUT_MS") {
            self.cache.op_timeout_ms = v.parse().unwrap_or(self.cache.op_timeout_ms);
        }

        // Security overrides
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("JWT_LEEWAY_SECS") {
            self.security.jwt_leeway_secs = v.parse().unwrap_or(self.security.jwt_leeway_secs);
        }

        self.clamped()
    }

    /// Pull every duration back inside its ceiling
    fn clamped(mut self) -> Self {
        self.server.request_timeout_ms = self.server.request_timeout_ms.min(MAX_TIMEOUT_MS);
        self.rate_limit.window_secs = self.rate_limit.window_secs.clamp(1, MAX_WINDOW_SECS);
        self.rate_limit.op_timeout_ms = self.rate_limit.op_timeout_ms.min(MAX_TIMEOUT_MS);
        self.cache.ttl_secs = self.cache.ttl_secs.min(MAX_CACHE_TTL_SECS);
        self.cache.op_timeout_ms = self.cache.op_timeout_ms.min(MAX_TIMEOUT_MS);
        self.security.jwt_expiry_hours = self.security.jwt_expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS);
        self.security.jwt_leeway_secs = self.security.jwt_leeway_secs.min(MAX_WINDOW_SECS);
        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                port: 3000,
                request_timeout_ms: 30_000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                sweep_interval_secs: 60,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                max_requests: 1000,
                window_secs: 60,
                key_mode: RateLimitKeyMode::Ip,
                trust_forwarded: false,
                op_timeout_ms: 50,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 30,
                op_timeout_ms: 50,
            },
            security: SecurityConfig {
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
                // Must come from JWT_SECRET
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                jwt_leeway_secs: 0,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                port: 3000,
                request_timeout_ms: 15_000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
                sweep_interval_secs: 60,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                max_requests: 100,
                window_secs: 60,
                key_mode: RateLimitKeyMode::Ip,
                trust_forwarded: true,
                op_timeout_ms: 50,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 60,
                op_timeout_ms: 50,
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.linkmetur.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                jwt_leeway_secs: 30,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                port: 3000,
                request_timeout_ms: 10_000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
                sweep_interval_secs: 30,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                max_requests: 60,
                window_secs: 60,
                key_mode: RateLimitKeyMode::Ip,
                trust_forwarded: true,
                op_timeout_ms: 25,
            },
            cache: CacheConfig {
                enabled: true,
                ttl_secs: 120,
                op_timeout_ms: 25,
            },
            security: SecurityConfig {
                cors_origins: vec![
                    "https://linkmetur.com".to_string(),
                    "https://app.linkmetur.com".to_string(),
                ],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                jwt_leeway_secs: 30,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.service_name, "linkmetur-api");
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.key_mode, RateLimitKeyMode::Ip);
        assert!(config.security.jwt_secret.is_empty());
    }

    #[test]
    fn unset_environment_has_no_usable_secret() {
        env::remove_var("APP_ENV");
        env::remove_var("JWT_SECRET");
        let config = AppConfig::from_env();
        assert_eq!(config.environment, Environment::Development);
        assert!(config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.rate_limit.max_requests, 60);
        assert!(config.rate_limit.trust_forwarded);
        // Production must be given a secret explicitly
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.security.cors_origins.iter().all(|o| o.starts_with("https://")));
    }

    #[test]
    fn oversized_overrides_are_clamped() {
        let mut config = AppConfig::development();
        config.rate_limit.window_secs = u64::MAX;
        config.cache.ttl_secs = u64::MAX;
        config.security.jwt_expiry_hours = u64::MAX;
        config.server.request_timeout_ms = u64::MAX;

        let config = config.clamped();
        assert_eq!(config.rate_limit.window_secs, MAX_WINDOW_SECS);
        assert_eq!(config.cache.ttl_secs, MAX_CACHE_TTL_SECS);
        assert_eq!(config.security.jwt_expiry_hours, MAX_JWT_EXPIRY_HOURS);
        assert_eq!(config.server.request_timeout_ms, MAX_TIMEOUT_MS);
    }

    #[test]
    fn duration_accessors_never_exceed_ceilings() {
        let mut config = AppConfig::development();
        config.rate_limit.window_secs = u64::MAX;
        config.cache.ttl_secs = u64::MAX;
        config.security.jwt_expiry_hours = u64::MAX;

        assert_eq!(config.rate_limit.window(), Duration::from_secs(MAX_WINDOW_SECS));
        assert_eq!(config.cache.ttl(), Duration::from_secs(MAX_CACHE_TTL_SECS));
        assert_eq!(
            config.security.jwt_expiry(),
            chrono::Duration::hours(MAX_JWT_EXPIRY_HOURS as i64)
        );
    }

    #[test]
    fn durations() {
        let config = AppConfig::development();
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.cache.ttl(), Duration::from_secs(30));
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
    }
}
