use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::extract::{FieldErrors, Validate, ValidatedJson};
use super::{commit, guarded};
use crate::app::AppState;
use crate::cache::RequestSignature;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CommitFence, TenantScope};
use crate::store::{Job, JobInput};
use crate::types::{ResourceKind, RoleLevel};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            guarded(get(list), RoleLevel::VIEWER).merge(guarded(post(create), RoleLevel::MANAGER)),
        )
        .route(
            "/jobs/:id",
            guarded(get(show), RoleLevel::VIEWER)
                .merge(guarded(put(update), RoleLevel::MANAGER))
                .merge(guarded(delete(destroy), RoleLevel::ADMIN)),
        )
}

impl Validate for JobInput {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required("title", &self.title);
        errors.max_len("title", Some(&self.title), 200);
        errors.max_len("description", self.description.as_deref(), 10_000);
        errors.max_len("location", self.location.as_deref(), 255);
        errors.into_result()
    }
}

/// GET /jobs - List the tenant's job postings (cached)
pub async fn list(
    State(state): State<AppState>,
    scope: TenantScope,
    signature: RequestSignature,
) -> ApiResult<Vec<Job>> {
    let store = state.stores.jobs.clone();
    let tenant = scope.tenant_id();

    let jobs = state
        .cache
        .read_through(&signature, || async move {
            store.list(tenant).await.map_err(ApiError::from)
        })
        .await?;

    Ok(ApiResponse::success(jobs))
}

/// GET /jobs/:id - Get a single job posting (cached)
pub async fn show(
    State(state): State<AppState>,
    scope: TenantScope,
    signature: RequestSignature,
    Path(id): Path<Uuid>,
) -> ApiResult<Job> {
    let store = state.stores.jobs.clone();
    let tenant = scope.tenant_id();

    let job = state
        .cache
        .read_through(&signature, || async move {
            store.get(tenant, id).await.map_err(ApiError::from)
        })
        .await?;

    Ok(ApiResponse::success(job))
}

/// POST /jobs - Publish a job posting
pub async fn create(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    ValidatedJson(input): ValidatedJson<JobInput>,
) -> ApiResult<Job> {
    let store = state.stores.jobs.clone();
    let (tenant, author) = (scope.tenant_id(), scope.user_id());

    let job = commit(&state, &fence, tenant, ResourceKind::Jobs, async move {
        store.create(tenant, author, input).await
    })
    .await?;

    info!("Created job {} in tenant {}", job.id, tenant);
    Ok(ApiResponse::created(job))
}

/// PUT /jobs/:id - Replace a job posting
pub async fn update(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<JobInput>,
) -> ApiResult<Job> {
    let store = state.stores.jobs.clone();
    let tenant = scope.tenant_id();

    let job = commit(&state, &fence, tenant, ResourceKind::Jobs, async move {
        store.update(tenant, id, input).await
    })
    .await?;

    Ok(ApiResponse::success(job))
}

/// DELETE /jobs/:id - Remove a job posting
pub async fn destroy(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let store = state.stores.jobs.clone();
    let tenant = scope.tenant_id();

    commit(&state, &fence, tenant, ResourceKind::Jobs, async move {
        store.delete(tenant, id).await
    })
    .await?;

    info!("Deleted job {} in tenant {}", id, tenant);
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
