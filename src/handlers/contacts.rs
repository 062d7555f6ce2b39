use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::extract::{FieldErrors, Validate, ValidatedJson};
use super::{commit, guarded};
use crate::app::AppState;
use crate::cache::RequestSignature;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CommitFence, TenantScope};
use crate::store::{Contact, ContactFilter, ContactInput, FavoriteToggle};
use crate::types::{ResourceKind, RoleLevel};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/contacts",
            guarded(get(list), RoleLevel::VIEWER).merge(guarded(post(create), RoleLevel::MEMBER)),
        )
        .route(
            "/contacts/:id",
            guarded(get(show), RoleLevel::VIEWER)
                .merge(guarded(put(update), RoleLevel::MEMBER))
                .merge(guarded(delete(destroy), RoleLevel::MEMBER)),
        )
        .route(
            "/contacts/:id/favorite",
            guarded(post(toggle_favorite), RoleLevel::MEMBER),
        )
}

#[derive(Debug, Deserialize)]
pub struct ContactQuery {
    pub search: Option<String>,
    pub favorite: Option<bool>,
}

impl Validate for ContactInput {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required("name", &self.name);
        errors.max_len("name", Some(&self.name), 255);
        errors.email("email", self.email.as_deref());
        errors.max_len("email", self.email.as_deref(), 255);
        errors.max_len("phone", self.phone.as_deref(), 50);
        errors.max_len("company", self.company.as_deref(), 255);
        errors.max_len("notes", self.notes.as_deref(), 5000);
        errors.into_result()
    }
}

/// GET /contacts - List the tenant's contacts (cached)
pub async fn list(
    State(state): State<AppState>,
    scope: TenantScope,
    signature: RequestSignature,
    query: Result<Query<ContactQuery>, QueryRejection>,
) -> ApiResult<Vec<Contact>> {
    let Query(query) = query?;
    let filter = ContactFilter {
        search: query.search,
        favorite: query.favorite,
    };
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    let contacts = state
        .cache
        .read_through(&signature, || async move {
            store.list(tenant, &filter).await.map_err(ApiError::from)
        })
        .await?;

    Ok(ApiResponse::success(contacts))
}

/// GET /contacts/:id - Get a single contact (cached)
pub async fn show(
    State(state): State<AppState>,
    scope: TenantScope,
    signature: RequestSignature,
    Path(id): Path<Uuid>,
) -> ApiResult<Contact> {
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    let contact = state
        .cache
        .read_through(&signature, || async move {
            store.get(tenant, id).await.map_err(ApiError::from)
        })
        .await?;

    Ok(ApiResponse::success(contact))
}

/// POST /contacts - Create a contact in the caller's tenant
pub async fn create(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    ValidatedJson(input): ValidatedJson<ContactInput>,
) -> ApiResult<Contact> {
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    let contact = commit(&state, &fence, tenant, ResourceKind::Contacts, async move {
        store.create(tenant, input).await
    })
    .await?;

    info!("Created contact {} in tenant {}", contact.id, tenant);
    Ok(ApiResponse::created(contact))
}

/// PUT /contacts/:id - Replace a contact's editable fields
pub async fn update(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<ContactInput>,
) -> ApiResult<Contact> {
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    let contact = commit(&state, &fence, tenant, ResourceKind::Contacts, async move {
        store.update(tenant, id, input).await
    })
    .await?;

    Ok(ApiResponse::success(contact))
}

/// DELETE /contacts/:id - Delete a contact
pub async fn destroy(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    commit(&state, &fence, tenant, ResourceKind::Contacts, async move {
        store.delete(tenant, id).await
    })
    .await?;

    info!("Deleted contact {} in tenant {}", id, tenant);
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

/// POST /contacts/:id/favorite - Flip the favorite flag
pub async fn toggle_favorite(
    State(state): State<AppState>,
    scope: TenantScope,
    fence: CommitFence,
    Path(id): Path<Uuid>,
) -> ApiResult<FavoriteToggle> {
    let store = state.stores.contacts.clone();
    let tenant = scope.tenant_id();

    let contact = commit(&state, &fence, tenant, ResourceKind::Contacts, async move {
        store.toggle_favorite(tenant, id).await
    })
    .await?;

    Ok(ApiResponse::success(FavoriteToggle::from(&contact)))
}
