//! Network layer.
//!
//! Plain listeners are bound with tokio directly; TLS is terminated by
//! axum-server with certificates loaded here.

pub mod tls;
