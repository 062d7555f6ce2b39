use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Json, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::cache::RequestSignature;
use crate::error::ApiError;
use crate::middleware::TenantScope;
use crate::types::ResourceKind;

/// Payload checks run before a handler sees the body
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

/// Field name -> problem, collected across all checks of one payload
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, problem: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| problem.into());
    }

    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) {
        if value.map_or(false, |v| v.chars().count() > max) {
            self.add(field, format!("must be at most {} characters", max));
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            if !looks_like_email(value) {
                self.add(field, "must be a valid email address");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::validation_failed("Request body failed validation", Some(errors.0))
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// JSON body that has been deserialized and passed `Validate`
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state).await?;
        payload.validate()?;
        Ok(ValidatedJson(payload))
    }
}

/// Cache identity of the current read, scoped to the guard's tenant
#[async_trait]
impl<S> FromRequestParts<S> for RequestSignature
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let scope = TenantScope::from_request_parts(parts, state).await?;
        let resource = ResourceKind::from_path(parts.uri.path()).ok_or_else(|| {
            ApiError::internal_error(format!("no resource kind for {}", parts.uri.path()))
        })?;

        Ok(RequestSignature::new(
            scope.tenant_id(),
            resource,
            parts.method.as_str(),
            parts.uri.path(),
            parts.uri.query(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("ana@lagoon.example"));
        assert!(!looks_like_email("ana"));
        assert!(!looks_like_email("@lagoon.example"));
        assert!(!looks_like_email("ana@localhost"));
        assert!(!looks_like_email("ana maria@lagoon.example"));
    }

    #[test]
    fn first_problem_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.required("name", " ");
        errors.max_len("name", Some("x"), 0);
        let err = ApiError::from(errors.into_result().unwrap_err());
        let envelope = err.to_envelope(None);
        assert_eq!(envelope.data.unwrap()["field_errors"]["name"], "is required");
    }

    #[test]
    fn clean_payload_passes() {
        let mut errors = FieldErrors::new();
        errors.required("title", "Guide");
        errors.email("email", None);
        assert!(errors.into_result().is_ok());
    }
}
