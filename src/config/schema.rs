//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the portal.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::access_control::Role;

/// Root configuration for the competition portal.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PortalConfig {
    /// HTTP listener and request limits.
    pub server: ServerConfig,

    /// Database / auth provider connection.
    pub database: DatabaseConfig,

    /// Request gate: rate limiting and access policy.
    pub gate: GateConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Which storage backend serves competitions and registrations.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Hosted Supabase project (PostgREST + GoTrue).
    #[default]
    Supabase,
    /// Process-local store, for development and tests.
    Memory,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,

    /// Project URL. Overridden by `SUPABASE_URL`.
    pub url: String,

    /// Public (anon) API key. Overridden by `SUPABASE_ANON_KEY`.
    pub anon_key: String,

    /// Per-request timeout for database calls, in seconds.
    pub timeout_secs: u64,

    /// Accounts known to the memory backend.
    pub dev_users: Vec<DevUser>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Supabase,
            url: String::new(),
            anon_key: String::new(),
            timeout_secs: 10,
            dev_users: Vec::new(),
        }
    }
}

/// A bearer token and the identity it stands for (memory backend only).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevUser {
    pub token: String,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// Request gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path prefixes that require a session.
    pub protected_prefixes: Vec<String>,

    /// Prefix reserved for the admin role.
    pub admin_prefix: String,

    /// Prefix reserved for instructors (privileged emails or admins).
    pub instructor_prefix: String,

    /// Where unauthenticated visitors are sent.
    pub login_path: String,

    /// Where authenticated visitors without the right role are sent.
    pub dashboard_path: String,

    /// Identities treated as instructors regardless of their profile role.
    pub privileged_emails: Vec<String>,

    /// Upper bound on each auth provider lookup, in milliseconds.
    pub lookup_timeout_ms: u64,

    pub rate_limit: RateLimitConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/instructor".to_string(),
                "/admin".to_string(),
            ],
            admin_prefix: "/admin".to_string(),
            instructor_prefix: "/instructor".to_string(),
            login_path: "/login".to_string(),
            dashboard_path: "/dashboard".to_string(),
            privileged_emails: Vec::new(),
            lookup_timeout_ms: 3000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per client per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Path prefixes subject to rate limiting.
    pub prefixes: Vec<String>,

    /// How often to purge expired windows, in seconds. 0 disables the sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 60,
            prefixes: vec![
                "/api/".to_string(),
                "/login".to_string(),
                "/register".to_string(),
            ],
            sweep_interval_secs: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
