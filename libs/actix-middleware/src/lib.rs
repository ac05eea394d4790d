//! Shared actix-web middleware: request-id propagation, request logging
//! and JWT validation.

pub mod jwt;
pub mod jwt_auth;
pub mod logging;
pub mod request_id;

pub use jwt_auth::{JwtAuthMiddleware, UserId};
pub use logging::Logging;
pub use request_id::{RequestId, RequestIdValue};
