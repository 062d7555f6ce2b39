use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::{Principal, TokenValidator};
use crate::error::ApiError;

/// Token validator stage. Attaches the request's `Principal` when a bearer
/// token is present and valid; rejects a present but unusable token. A
/// request without credentials continues unauthenticated and is turned away
/// by the tenant guard.
pub async fn authenticate(
    State(validator): State<Arc<TokenValidator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Set exactly once per request
    if request.extensions().get::<Principal>().is_some() {
        return Err(ApiError::internal_error("principal attached twice to one request"));
    }

    if let Some(principal) = principal_from_headers(&validator, request.headers())? {
        debug!(
            "Authenticated user {} of tenant {} (role {})",
            principal.user_id(),
            principal.tenant_id(),
            principal.role_level()
        );
        request.extensions_mut().insert(principal);
    }

    Ok(next.run(request).await)
}

/// Resolve the principal carried by the `Authorization` header.
///
/// Every failure class collapses to `ApiError::Unauthenticated`; the class
/// itself is only logged.
pub fn principal_from_headers(
    validator: &TokenValidator,
    headers: &HeaderMap,
) -> Result<Option<Principal>, ApiError> {
    let token = match bearer_token(headers) {
        Ok(Some(token)) => token,
        Ok(None) => return Ok(None),
        Err(reason) => {
            debug!("Rejected credentials: {}", reason);
            return Err(ApiError::Unauthenticated);
        }
    };

    validator.validate(token).map(Some).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::from(e)
    })
}

/// Extract the raw token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?
        .trim();

    if token.is_empty() {
        return Err("Empty bearer token");
    }
    Ok(Some(token))
}
