//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! portal.toml
//!     → loader.rs (parse, SUPABASE_* overrides)
//!     → validation.rs (semantic checks)
//!     → PortalConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → server swaps gate policy and limiter settings
//! ```
//!
//! Only the gate section is applied on reload. Listener, database and
//! observability changes need a restart.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::DatabaseBackend;
pub use schema::DatabaseConfig;
pub use schema::DevUser;
pub use schema::GateConfig;
pub use schema::ObservabilityConfig;
pub use schema::PortalConfig;
pub use schema::RateLimitConfig;
pub use schema::ServerConfig;
