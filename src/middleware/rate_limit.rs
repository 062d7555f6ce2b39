use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::ratelimit::{RateLimitDecision, RateLimiter};

/// Rate limiter stage. Runs before authentication, so anonymous and
/// authenticated traffic from one client share a budget.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    let client = client_key(&request, limiter.trusts_forwarded());
    let path = request.uri().path().to_string();

    match limiter.check(&client, &path).await {
        RateLimitDecision::Exceeded { limit, retry_after_secs } => {
            warn!(
                "Rate limit exceeded: client={} path={} limit={} retry_after={}s",
                client, path, limit, retry_after_secs
            );
            Err(ApiError::RateLimited { retry_after_secs })
        }
        RateLimitDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            Ok(response)
        }
    }
}

/// Client address used as limiter key: the last `X-Forwarded-For` hop when
/// running behind a trusted proxy, otherwise the socket peer.
///
/// The proxy appends the address it saw to whatever the client sent, so only
/// the rightmost hop is out of the client's control.
pub fn client_key(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RateLimitConfig, RateLimitKeyMode};
    use crate::ratelimit::MemoryCounterStore;
    use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn limiter(max_requests: u64, trust_forwarded: bool) -> Arc<RateLimiter> {
        let config = RateLimitConfig {
            enabled: true,
            max_requests,
            window_secs: 60,
            key_mode: RateLimitKeyMode::Ip,
            trust_forwarded,
            op_timeout_ms: 50,
        };
        Arc::new(RateLimiter::new(&config, Arc::new(MemoryCounterStore::new())))
    }

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(limiter, enforce_rate_limit))
    }

    fn from_peer(ip: [u8; 4]) -> Request {
        Request::builder()
            .uri("/ping")
            .extension(ConnectInfo(SocketAddr::from((ip, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_above_ceiling_with_retry_after() {
        let app = app(limiter(2, false));

        for remaining in ["1", "0"] {
            let response = app.clone().oneshot(from_peer([10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["x-ratelimit-limit"], "2");
            assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
        }

        let response = app.clone().oneshot(from_peer([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        // Another client has its own budget
        let response = app.oneshot(from_peer([10, 0, 0, 2])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn forwarded_hop_only_when_trusted() {
        let request = Request::builder()
            .uri("/ping")
            .header("x-forwarded-for", "203.0.113.9, 198.51.100.7")
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 1234))))
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_key(&request, true), "198.51.100.7");
        assert_eq!(client_key(&request, false), "10.0.0.1");
    }

    #[tokio::test]
    async fn spoofed_leading_hops_share_one_budget() {
        let app = app(limiter(1, true));

        let mut statuses = Vec::new();
        for i in 1..=5 {
            let request = Request::builder()
                .uri("/ping")
                .header("x-forwarded-for", format!("198.51.100.{}, 10.0.0.9", i))
                .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 40000))))
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn unknown_peer_still_gets_a_key() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, true), "unknown");
    }
}
