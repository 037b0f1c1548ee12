use serde::Deserialize;
use tracing::info;

use tradeflow_core::{ExpectedVersion, OrganizationId};
use tradeflow_events::EventBus;
use tradeflow_ledger::{CreateWarehouse, Warehouse, WarehouseId};

use super::{LedgerService, ServiceResult};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

/// Location filters for listing warehouses (case-insensitive, combinable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WarehouseFilter {
    pub state: Option<String>,
    pub city: Option<String>,
}

impl WarehouseFilter {
    pub fn matches(&self, warehouse: &Warehouse) -> bool {
        let location = warehouse.location();
        self.state
            .as_deref()
            .is_none_or(|s| location.state.eq_ignore_ascii_case(s.trim()))
            && self
                .city
                .as_deref()
                .is_none_or(|c| location.city.eq_ignore_ascii_case(c.trim()))
    }
}

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Register a warehouse with three empty buckets.
    pub async fn create_warehouse(&self, cmd: CreateWarehouse) -> ServiceResult<Warehouse> {
        let organization = cmd.organization;
        let warehouse = Warehouse::create(cmd)?;

        let mut changes = ChangeSet::new();
        changes.put(&warehouse, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        info!(
            organization_id = %organization,
            warehouse_id = %warehouse.id_typed(),
            "warehouse created"
        );
        Ok(warehouse)
    }

    pub async fn get_warehouse(
        &self,
        organization: OrganizationId,
        id: WarehouseId,
    ) -> ServiceResult<Warehouse> {
        Ok(self.load_warehouse(organization, id).await?.document)
    }

    pub async fn list_warehouses(
        &self,
        organization: OrganizationId,
        filter: &WarehouseFilter,
    ) -> ServiceResult<Vec<Warehouse>> {
        let warehouses: Vec<Warehouse> = fetch_all(&self.store, organization).await?;
        Ok(warehouses.into_iter().filter(|w| filter.matches(w)).collect())
    }
}
