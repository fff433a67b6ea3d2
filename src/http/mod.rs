//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (x-request-id)
//!     → middleware/gate.rs (rate limit, session, access policy)
//!     → api handlers
//!     → response.rs (entity envelope or {"error": ...})
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ApiError, ApiResult};
pub use server::HttpServer;
