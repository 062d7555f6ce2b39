use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::types::{RoleLevel, TenantId};

/// Proof that the tenant guard admitted the request. The tenant id comes from
/// the principal and is the only tenant a handler can act on.
#[derive(Debug, Clone)]
pub struct TenantScope {
    tenant_id: TenantId,
    principal: Principal,
}

impl TenantScope {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.user_id()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Decide whether `principal` may reach a route requiring `minimum`
pub fn authorize(principal: Option<&Principal>, minimum: RoleLevel) -> Result<TenantScope, ApiError> {
    let principal = principal.ok_or(ApiError::Unauthenticated)?;

    if !principal.role_level().satisfies(minimum) {
        return Err(ApiError::forbidden(format!(
            "This action requires role level {} or higher",
            minimum
        )));
    }

    Ok(TenantScope {
        tenant_id: principal.tenant_id(),
        principal: principal.clone(),
    })
}

/// Tenant guard stage, attached per route with the route's minimum role
pub async fn require_role(
    State(minimum): State<RoleLevel>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let scope = authorize(request.extensions().get::<Principal>(), minimum).map_err(|e| {
        debug!("Tenant guard denied {} {}: {}", request.method(), request.uri().path(), e);
        e
    })?;

    request.extensions_mut().insert(scope);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A route without a guard never yields a scope
        parts
            .extensions
            .get::<TenantScope>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}
