use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Set by a handler right before it writes. Past this point the deadline no
/// longer cuts the request short: the write and its cache invalidation finish
/// and the client gets their real outcome.
#[derive(Debug, Clone, Default)]
pub struct CommitFence(Arc<AtomicBool>);

impl CommitFence {
    pub fn enter(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_entered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CommitFence
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Outside the deadline stage nothing watches the fence
        Ok(parts.extensions.get::<CommitFence>().cloned().unwrap_or_default())
    }
}

/// Bound everything downstream (handler, cache and store I/O) by `deadline`,
/// up to the moment a write commits
pub async fn enforce_deadline(
    State(deadline): State<Duration>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let fence = CommitFence::default();
    request.extensions_mut().insert(fence.clone());

    let mut handler = std::pin::pin!(next.run(request));
    match tokio::time::timeout(deadline, handler.as_mut()).await {
        Ok(response) => Ok(response),
        Err(_) if fence.is_entered() => {
            debug!("{} {} passed its deadline mid-write, waiting for the commit", method, path);
            Ok(handler.await)
        }
        Err(_) => {
            warn!("{} {} exceeded the {}ms deadline", method, path, deadline.as_millis());
            Err(ApiError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt;

    fn app(deadline: Duration) -> Router {
        Router::new()
            .route("/fast", get(|| async { "done" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/write",
                post(|fence: CommitFence| async move {
                    fence.enter();
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    "written"
                }),
            )
            .route(
                "/stuck-before-write",
                post(|_fence: CommitFence| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "never"
                }),
            )
            .route_layer(from_fn_with_state(deadline, enforce_deadline))
    }

    fn req(method: &str, uri: &str) -> Request {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let response = app(Duration::from_millis(50)).oneshot(req("GET", "/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.extensions().get::<ApiError>(), Some(&ApiError::Timeout));
    }

    #[tokio::test]
    async fn fast_handler_passes() {
        let response = app(Duration::from_millis(500)).oneshot(req("GET", "/fast")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn committed_write_outlives_deadline() {
        let response = app(Duration::from_millis(50)).oneshot(req("POST", "/write")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "written".as_bytes());
    }

    #[tokio::test]
    async fn write_that_never_started_still_times_out() {
        let response = app(Duration::from_millis(50))
            .oneshot(req("POST", "/stuck-before-write"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
