// middleware/mod.rs - request pipeline stages
//
// Each stage is a plain async fn wired with `axum::middleware::from_fn*`.
// The order they run in is spelled out in `app::build`:
// Error Translator -> Rate Limiter -> Token Validator -> deadline
// -> Tenant Guard -> handler (cache tier + envelope encoder).

pub mod auth;
pub mod deadline;
pub mod rate_limit;
pub mod response;
pub mod tenant;
pub mod translate;

pub use auth::{authenticate, principal_from_headers};
pub use deadline::{enforce_deadline, CommitFence};
pub use rate_limit::{client_key, enforce_rate_limit};
pub use response::{ApiResponse, ApiResult};
pub use tenant::{authorize, require_role, TenantScope};
pub use translate::translate_errors;
