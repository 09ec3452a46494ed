use crate::memory::InMemoryVerifyStorage;
use crate::traits::VerifyStorage;
use crate::StorageResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Storage backend selection. Keys are snake_case; unknown keys are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum StorageConfig {
    /// In-memory storage (development and tests)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        url: String,

        #[serde(default = "default_pool_size")]
        max_connections: u32,

        #[serde(default = "default_connect_timeout")]
        connect_timeout_secs: u64,
    },
}

impl StorageConfig {
    pub fn postgres(url: impl Into<String>) -> Self {
        Self::Postgres {
            url: url.into(),
            max_connections: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

/// Build the storage handle described by `config`. The caller owns it and
/// must call `close` at shutdown.
pub async fn open_storage(config: &StorageConfig) -> StorageResult<Arc<dyn VerifyStorage>> {
    match config {
        StorageConfig::Memory => {
            info!(backend = "memory", "Opening storage");
            Ok(Arc::new(InMemoryVerifyStorage::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => open_postgres(url, *max_connections, *connect_timeout_secs).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(
    url: &str,
    max_connections: u32,
    connect_timeout_secs: u64,
) -> StorageResult<Arc<dyn VerifyStorage>> {
    info!(backend = "postgres", max_connections, "Opening storage");
    let store = crate::postgres::PostgresVerifyStorage::connect_with_options(
        url,
        max_connections,
        connect_timeout_secs,
    )
    .await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(
    _url: &str,
    _max_connections: u32,
    _connect_timeout_secs: u64,
) -> StorageResult<Arc<dyn VerifyStorage>> {
    Err(crate::StorageError::InvalidInput(
        "postgres storage requested but ave-storage was built without the `postgres` feature"
            .to_string(),
    ))
}
