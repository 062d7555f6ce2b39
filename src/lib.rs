pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ratelimit;
pub mod store;
pub mod types;

pub use app::{build, AppState, Components};
pub use error::ApiError;

#[cfg(test)]
pub mod testing;
