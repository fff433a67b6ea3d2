//! Configuration validation.
//!
//! Serde handles the syntax; this module checks the values make sense
//! together. Every problem is reported, not just the first one.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{DatabaseBackend, PortalConfig};

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &PortalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if config.database.backend == DatabaseBackend::Supabase {
        match Url::parse(&config.database.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::new(
                "database.url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "database.url",
                format!("invalid URL: {}", e),
            )),
        }
        if config.database.anon_key.trim().is_empty() {
            errors.push(ValidationError::new("database.anon_key", "must be set (or SUPABASE_ANON_KEY)"));
        }
    }

    let gate = &config.gate;
    let prefixed = gate
        .protected_prefixes
        .iter()
        .map(|p| ("gate.protected_prefixes", p))
        .chain(gate.rate_limit.prefixes.iter().map(|p| ("gate.rate_limit.prefixes", p)))
        .chain([
            ("gate.admin_prefix", &gate.admin_prefix),
            ("gate.instructor_prefix", &gate.instructor_prefix),
            ("gate.login_path", &gate.login_path),
            ("gate.dashboard_path", &gate.dashboard_path),
        ]);
    for (field, value) in prefixed {
        if !value.starts_with('/') {
            errors.push(ValidationError::new(field, format!("'{}' must start with '/'", value)));
        }
    }

    for email in &gate.privileged_emails {
        if !email.contains('@') {
            errors.push(ValidationError::new(
                "gate.privileged_emails",
                format!("'{}' is not an email address", email),
            ));
        }
    }
    if gate.lookup_timeout_ms == 0 {
        errors.push(ValidationError::new("gate.lookup_timeout_ms", "must be greater than 0"));
    }
    if gate.rate_limit.enabled {
        if gate.rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("gate.rate_limit.max_requests", "must be greater than 0"));
        }
        if gate.rate_limit.window_secs == 0 {
            errors.push(ValidationError::new("gate.rate_limit.window_secs", "must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> PortalConfig {
        let mut config = PortalConfig::default();
        config.database.backend = DatabaseBackend::Memory;
        config
    }

    #[test]
    fn test_defaults_with_memory_backend_are_valid() {
        assert!(validate_config(&memory_config()).is_ok());
    }

    #[test]
    fn test_supabase_backend_requires_url_and_key() {
        let errors = validate_config(&PortalConfig::default()).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"database.url"));
        assert!(fields.contains(&"database.anon_key"));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = memory_config();
        config.server.bind_address = "not-an-addr".into();
        config.gate.rate_limit.max_requests = 0;
        config.gate.protected_prefixes.push("admin".into());
        config.gate.privileged_emails.push("nobody".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_disabled_rate_limit_skips_limit_checks() {
        let mut config = memory_config();
        config.gate.rate_limit.enabled = false;
        config.gate.rate_limit.window_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
