//! Student competition portal: listings, registration, staff review, and
//! the request gate in front of them.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod store;
pub mod supabase;

pub use config::PortalConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
