//! Startup orchestration.
//!
//! Builds the storage and identity backends named by the configuration.
//! Any failure here is fatal.

use std::sync::Arc;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::security::session::IdentityProvider;
use crate::store::{MemoryStore, Store, StoreError};
use crate::supabase::SupabaseClient;

/// The data store and the identity provider the gate consults.
pub struct Backends {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub fn build_backends(config: &DatabaseConfig) -> Result<Backends, StoreError> {
    match config.backend {
        DatabaseBackend::Supabase => {
            let client = Arc::new(SupabaseClient::new(config)?);
            tracing::info!(url = %config.url, "Using Supabase backend");
            Ok(Backends {
                store: client.clone(),
                identity: client,
            })
        }
        DatabaseBackend::Memory => {
            let store = Arc::new(MemoryStore::with_users(&config.dev_users));
            tracing::warn!(
                accounts = config.dev_users.len(),
                "Using in-memory backend; data is lost on restart"
            );
            Ok(Backends {
                store: store.clone(),
                identity: store,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supabase_backend_rejects_bad_url() {
        let config = DatabaseConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        assert!(build_backends(&config).is_err());
    }

    #[test]
    fn test_memory_backend() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Memory,
            ..Default::default()
        };
        assert!(build_backends(&config).is_ok());
    }
}
