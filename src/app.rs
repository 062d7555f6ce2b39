//! Application state and pipeline composition.
//!
//! Stage order for every request, outermost first:
//!
//! 1. trace + CORS
//! 2. error translator
//! 3. rate limiter
//! 4. token validator (protected routes)
//! 5. deadline (protected routes)
//! 6. tenant guard (per method, with that route's minimum role)
//! 7. handler: cache tier read-through, envelope encoder on the way out

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{AllowCredentials, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::auth::{AuthError, TokenValidator};
use crate::cache::{CacheStore, CacheTier, MemoryCacheStore};
use crate::config::AppConfig;
use crate::handlers::{self, contacts, health, jobs, notifications};
use crate::middleware::{authenticate, enforce_deadline, enforce_rate_limit, translate_errors};
use crate::ratelimit::{CounterStore, MemoryCounterStore, RateLimiter};
use crate::store::Stores;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub cache: CacheTier,
}

/// Backing stores the pipeline is assembled from
#[derive(Clone)]
pub struct Components {
    pub stores: Stores,
    pub cache_store: Arc<dyn CacheStore>,
    pub counter_store: Arc<dyn CounterStore>,
}

impl Components {
    /// Single-process deployment: everything lives in memory
    pub fn in_memory() -> Self {
        Self {
            stores: Stores::in_memory(),
            cache_store: Arc::new(MemoryCacheStore::new()),
            counter_store: Arc::new(MemoryCounterStore::new()),
        }
    }
}

/// Build the full router. Fails only when no JWT secret is configured.
pub fn build(config: AppConfig, components: Components) -> Result<Router, AuthError> {
    let config = Arc::new(config);
    let validator = Arc::new(TokenValidator::from_config(&config.security)?);
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit, components.counter_store));
    let cache = CacheTier::new(&config.cache, components.cache_store);

    if !config.rate_limit.enabled {
        warn!("Rate limiting is disabled");
    }
    if !config.cache.enabled {
        warn!("Cache tier is disabled");
    }

    let state = AppState {
        config: config.clone(),
        stores: components.stores,
        cache,
    };

    let protected = Router::new()
        .merge(contacts::routes())
        .merge(notifications::routes())
        .merge(jobs::routes())
        .route_layer(from_fn_with_state(config.server.request_timeout(), enforce_deadline))
        .route_layer(from_fn_with_state(validator, authenticate));

    let router = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.server.max_request_size_bytes))
        .layer(from_fn_with_state(limiter, enforce_rate_limit))
        .layer(from_fn(translate_errors))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

/// Only allow-listed origins are echoed back, and only they get credentials
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let credentialed = allowed.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
        ])
        .allow_credentials(AllowCredentials::predicate(move |origin, _| {
            credentialed.contains(origin)
        }))
}

/// Periodically drop expired limiter windows and cache entries
pub fn spawn_sweeper(config: &AppConfig, components: &Components) -> JoinHandle<()> {
    let limiter = RateLimiter::new(&config.rate_limit, components.counter_store.clone());
    let cache = CacheTier::new(&config.cache, components.cache_store.clone());
    let every = Duration::from_secs(config.server.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let windows = limiter.purge_expired().await;
            let entries = cache.purge_expired().await;
            if windows + entries > 0 {
                debug!("Swept {} rate limit windows and {} cache entries", windows, entries);
            }
        }
    })
}
