//! Append-only audit trail of bucket movements.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tradeflow_catalog::{BuyerId, ItemId, ManufacturerId, Pickup};
use tradeflow_core::{AggregateId, OrganizationId};

use crate::bucket::Bucket;
use crate::warehouse::WarehouseId;

/// Kind of entity on either side of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Order,
    Warehouse,
    Buyer,
    Manufacturer,
}

/// Tagged reference to the source or destination of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: AggregateId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: AggregateId) -> Self {
        Self { kind, id }
    }

    pub fn order(id: AggregateId) -> Self {
        Self::new(EntityKind::Order, id)
    }

    pub fn warehouse(id: WarehouseId) -> Self {
        Self::new(EntityKind::Warehouse, id.aggregate_id())
    }

    pub fn buyer(id: BuyerId) -> Self {
        Self::new(EntityKind::Buyer, id.aggregate_id())
    }

    pub fn manufacturer(id: ManufacturerId) -> Self {
        Self::new(EntityKind::Manufacturer, id.aggregate_id())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.id)
    }
}

/// One immutable bucket movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub organization: OrganizationId,
    pub warehouse: WarehouseId,
    pub item: ItemId,
    pub pickup: Pickup,
    pub source: EntityRef,
    pub destination: EntityRef,
    /// Signed delta applied to `bucket`.
    pub quantity: i64,
    pub bucket: Bucket,
    pub occurred_at: DateTime<Utc>,
}

/// Where history records go. No read API.
pub trait HistorySink {
    fn record(&mut self, entry: HistoryRecord);
}

impl HistorySink for Vec<HistoryRecord> {
    fn record(&mut self, entry: HistoryRecord) {
        self.push(entry);
    }
}

impl<S: HistorySink + ?Sized> HistorySink for &mut S {
    fn record(&mut self, entry: HistoryRecord) {
        (**self).record(entry);
    }
}

/// Optional, combinable filters over history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub item: Option<ItemId>,
    pub bucket: Option<Bucket>,
    pub pickup: Option<Pickup>,
}

impl HistoryQuery {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        self.item.is_none_or(|i| i == record.item)
            && self.bucket.is_none_or(|b| b == record.bucket)
            && self.pickup.is_none_or(|p| p == record.pickup)
    }
}
