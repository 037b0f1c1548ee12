//! Per-warehouse serialization inside one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use tradeflow_core::OrganizationId;
use tradeflow_ledger::WarehouseId;

/// One async mutex per warehouse.
///
/// Transactions on the same warehouse run one at a time; different
/// warehouses never contend.
///
/// Entries are never evicted. The map holds one mutex per warehouse ever
/// locked, so it is bounded by the number of warehouses.
#[derive(Debug, Default)]
pub struct WarehouseLocks {
    locks: Mutex<HashMap<(OrganizationId, WarehouseId), Arc<AsyncMutex<()>>>>,
}

impl WarehouseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `warehouse`. Released when the guard drops.
    pub async fn acquire(
        &self,
        organization: OrganizationId,
        warehouse: WarehouseId,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry((organization, warehouse)).or_default().clone()
        };
        lock.lock_owned().await
    }
}
