use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::value_objects::InventoryItemId;

// ============================================================================
// On-hand Stock Query
// ============================================================================

/// Source of physical on-hand quantities (owned by the inventory service).
#[async_trait]
pub trait StockLevels: Send + Sync {
    /// `Ok(None)` when the item is not stocked at all
    async fn on_hand(&self, item: &InventoryItemId) -> anyhow::Result<Option<u32>>;
}

#[derive(Default)]
pub struct InMemoryStockLevels {
    levels: RwLock<HashMap<InventoryItemId, u32>>,
}

impl InMemoryStockLevels {
    pub fn with_levels<I, K>(levels: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<InventoryItemId>,
    {
        Self {
            levels: RwLock::new(levels.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    pub async fn set_on_hand(&self, item: impl Into<InventoryItemId>, quantity: u32) {
        self.levels.write().await.insert(item.into(), quantity);
    }
}

#[async_trait]
impl StockLevels for InMemoryStockLevels {
    async fn on_hand(&self, item: &InventoryItemId) -> anyhow::Result<Option<u32>> {
        Ok(self.levels.read().await.get(item).copied())
    }
}
