use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::extract::{FieldErrors, Validate, ValidatedJson};
use super::{commit, guarded};
use crate::app::AppState;
use crate::cache::RequestSignature;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CommitFence, TenantScope};
use crate::store::{Notification, NotificationInput};
use crate::types::{ResourceKind, RoleLevel};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            guarded(get(list), RoleLevel::VIEWER).merge(guarded(post(create), RoleLevel::MANAGER)),
        )
        .route(
            "/notifications/read-all",
            guarded(patch(mark_all_read), RoleLevel::MEMBER),
        )
        .route(
            "/notifications/:id",
            guarded(delete(destroy), RoleLevel::MEMBER),
        )
        .route(
            "/notifications/:id/read",
            guarded(patch(mark_read), RoleLevel::MEMBER),
        )
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

impl Validate for NotificationInput {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.user_id.is_nil() {
            errors.add("user_id", "is required");
        }
        errors.required("title", &self.title);
        errors.max_len("title", Some(&self.title), 200);
        errors.max_len("body", self.body.as_deref(), 2000);
        errors.into_result()
    }
}

/// GET /notifications - Notifications visible to the caller (cached per user)
pub async fn list(
    State(state): State<AppState>,
    scope: TenantScope,
    signature: RequestSignature,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> ApiResult<Vec<Notification>> {
    let Query(query) = query?;
    let store = state.stores.notifications.clone();
    let (tenant, user) = (scope.tenant_id(), scope.user_id());

    let notifications = state
        .cache
        .read_through(&signature.per_user(user), || async move {
            store.list(tenant, user, query.unread).await.map_err(ApiError::from)
        })
        .await?;

    Ok(ApiResponse::success(notifications))
}

/// POST /notifications - Send a notification to a user of the tenant
pub async fn create(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    ValidatedJson(input): ValidatedJson<NotificationInput>,
) -> ApiResult<Notification> {
    let store = state.stores.notifications.clone();
    let tenant = scope.tenant_id();

    let notification = commit(&state, &fence, tenant, ResourceKind::Notifications, async move {
        store.create(tenant, input).await
    })
    .await?;

    Ok(ApiResponse::created(notification))
}

/// PATCH /notifications/:id/read - Mark one notification as read
pub async fn mark_read(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    let store = state.stores.notifications.clone();
    let (tenant, user) = (scope.tenant_id(), scope.user_id());

    let notification = commit(&state, &fence, tenant, ResourceKind::Notifications, async move {
        store.mark_read(tenant, user, id).await
    })
    .await?;

    Ok(ApiResponse::success(notification))
}

/// PATCH /notifications/read-all - Mark everything visible to the caller as read
pub async fn mark_all_read(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
) -> ApiResult<()> {
    let store = state.stores.notifications.clone();
    let (tenant, user) = (scope.tenant_id(), scope.user_id());

    commit(&state, &fence, tenant, ResourceKind::Notifications, async move {
        store.mark_all_read(tenant, user).await
    })
    .await?;

    Ok(ApiResponse::empty())
}

/// DELETE /notifications/:id - Dismiss a notification
pub async fn destroy(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let store = state.stores.notifications.clone();
    let (tenant, user) = (scope.tenant_id(), scope.user_id());

    commit(&state, &fence, tenant, ResourceKind::Notifications, async move {
        store.delete(tenant, user, id).await
    })
    .await?;

    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
