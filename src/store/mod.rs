pub mod disk;
pub mod memory;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::core::config::{AppConfig, StorageKind};
use crate::core::store::RateStore;
pub use disk::DiskRateStore;
pub use memory::MemoryRateStore;

/// Opens the store selected in the config. The disk store lives in the
/// `rates` directory under the data path.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    match config.storage {
        StorageKind::Memory => {
            info!("Using in-memory rate store");
            Ok(Arc::new(MemoryRateStore::new()))
        }
        StorageKind::Disk => {
            let path = config.default_data_path()?.join("rates");
            let store = DiskRateStore::open(&path)
                .with_context(|| format!("Failed to open rate store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}
