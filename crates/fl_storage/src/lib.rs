use std::sync::Arc;

use async_trait::async_trait;
use fl_core::{AnalysisStore, Error, Result};

pub mod backends;

pub use backends::*;

/// A store that can be opened with its default settings.
#[async_trait]
pub trait StorageBackend: AnalysisStore {
    async fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Builds the store named on the command line. `location` is the database
/// path for stores that have one.
pub async fn create_storage(kind: &str, location: Option<&str>) -> Result<Arc<dyn AnalysisStore>> {
    match (kind, location) {
        ("memory", _) => Ok(Arc::new(<InMemoryStorage as StorageBackend>::new().await?)),
        #[cfg(feature = "sqlite")]
        ("sqlite", Some(path)) => Ok(Arc::new(
            SQLiteStorage::new_with_path(std::path::Path::new(path)).await?,
        )),
        #[cfg(feature = "sqlite")]
        ("sqlite", None) => Ok(Arc::new(SQLiteStorage::new().await?)),
        (other, _) => Err(Error::Storage(format!(
            "Unsupported storage backend '{}'. Available: {}",
            other,
            available_backends().join(", ")
        ))),
    }
}

pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["memory"];
    if cfg!(feature = "sqlite") {
        backends.push("sqlite");
    }
    backends
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}
