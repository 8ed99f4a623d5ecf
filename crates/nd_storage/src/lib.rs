use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use nd_core::{ArticleStorage, Error, Result};
use tracing::info;

pub mod backends;

pub use backends::*;

/// Storage backends selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Sqlite => "sqlite",
            StorageKind::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            other => Err(Error::Storage(format!(
                "Unknown storage backend: {} (expected sqlite or memory)",
                other
            ))),
        }
    }
}

/// Opens the named backend. `database_path` is only used by SQLite.
pub async fn create_storage(kind: &str, database_path: &Path) -> Result<Arc<dyn ArticleStorage>> {
    let storage: Arc<dyn ArticleStorage> = match kind.parse::<StorageKind>()? {
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Arc::new(SQLiteStorage::new_with_path(database_path).await?),
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => {
            return Err(Error::Storage(format!(
                "SQLite support is not compiled in, cannot open {}",
                database_path.display()
            )))
        }
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    };
    info!("🏦 Storage backend initialized (using {})", kind);
    Ok(storage)
}
