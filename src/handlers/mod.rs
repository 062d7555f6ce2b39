// handlers/mod.rs - route handlers behind the pipeline
//
// Public:    /, /health          (rate limited only)
// Protected: /contacts, /notifications, /jobs
//            (rate limited -> token validator -> tenant guard per method)

pub mod contacts;
pub mod extract;
pub mod health;
pub mod jobs;
pub mod notifications;

use axum::{http::Uri, middleware::from_fn_with_state, routing::MethodRouter};
use std::future::Future;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{require_role, CommitFence};
use crate::store::StoreError;
use crate::types::{ResourceKind, RoleLevel, TenantId};

/// Attach the tenant guard with `minimum` to one method route
pub(crate) fn guarded(route: MethodRouter<AppState>, minimum: RoleLevel) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(minimum, require_role))
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

/// Run a store write and the invalidation of `resource` as one unit on its own
/// task. Neither the deadline nor a dropped connection can land between them.
pub(crate) async fn commit<T, Fut>(
    state: &AppState,
    fence: &CommitFence,
    tenant_id: TenantId,
    resource: ResourceKind,
    write: Fut,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    fence.enter();
    let cache = state.cache.clone();

    let unit = tokio::spawn(async move {
        let written = write.await?;
        cache.invalidate(tenant_id, resource).await;
        Ok::<T, StoreError>(written)
    });

    unit.await
        .map_err(|e| ApiError::internal_error(format!("Write task failed: {}", e)))?
        .map_err(ApiError::from)
}
