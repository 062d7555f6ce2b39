use axum::{
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

use crate::error::ApiError;

/// Error translator stage, outermost in the pipeline.
///
/// Every failing response leaves here as exactly one failure envelope stamped
/// with the request path: classified `ApiError`s are re-rendered, framework
/// rejections are classified by status, and panics become `InternalError`.
pub async fn translate_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => translate(response, &method, &path),
        Err(panic) => {
            let err = ApiError::internal_error(format!("handler panicked: {}", panic_message(&*panic)));
            log_failure(&err, &method, &path);
            err.render(Some(&path))
        }
    }
}

fn translate(response: Response, method: &Method, path: &str) -> Response {
    let err = match response.extensions().get::<ApiError>() {
        Some(err) => err.clone(),
        None if is_failure(&response) => ApiError::from_status(response.status()),
        None => return response,
    };

    log_failure(&err, method, path);

    let mut rendered = err.render(Some(path));
    // Keep stage headers such as X-RateLimit-* and Allow
    for (name, value) in response.headers() {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        if !rendered.headers().contains_key(name) {
            rendered.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rendered
}

fn is_failure(response: &Response) -> bool {
    let status = response.status();
    status.is_client_error() || status.is_server_error()
}

fn log_failure(err: &ApiError, method: &Method, path: &str) {
    match err {
        ApiError::InternalError(detail) => error!("{} {} failed: {}", method, path, detail),
        other => debug!("{} {} -> {} {}", method, path, other.status_code().as_u16(), other.error_code()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
