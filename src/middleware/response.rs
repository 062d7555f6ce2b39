use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::api::envelope::encode;
use crate::error::ApiError;

/// Handler result wrapped by the envelope encoder on its way out
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data: Some(data),
            status_code,
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl ApiResponse<()> {
    /// Handler produced no value; encodes as an empty `data` object
    pub fn empty() -> Self {
        Self {
            data: None,
            status_code: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let value = match self.data.map(|data| serde_json::to_value(&data)).transpose() {
            Ok(value) => value,
            Err(e) => return ApiError::from(e).into_response(),
        };

        (self.status_code, Json(encode(value))).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
