use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::{AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id};

use crate::bucket::{Bucket, BucketKey, entries};

aggregate_id!(
    /// A warehouse document (the unit of serialization for bucket mutations).
    WarehouseId
);

/// Where a warehouse is, used for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub state: String,
    pub city: String,
}

/// Command: CreateWarehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWarehouse {
    pub organization: OrganizationId,
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub location: Location,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: Warehouse.
///
/// Exclusively owns the three buckets. Every quantity is `>= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    id: WarehouseId,
    organization: OrganizationId,
    name: String,
    location: Location,
    #[serde(with = "entries")]
    available: BTreeMap<BucketKey, i64>,
    #[serde(with = "entries")]
    committed: BTreeMap<BucketKey, i64>,
    #[serde(with = "entries")]
    billed: BTreeMap<BucketKey, i64>,
    version: u64,
    created_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn create(cmd: CreateWarehouse) -> DomainResult<Self> {
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        if cmd.location.state.trim().is_empty() || cmd.location.city.trim().is_empty() {
            return Err(DomainError::validation("warehouse location needs a state and a city"));
        }

        Ok(Self {
            id: cmd.warehouse_id,
            organization: cmd.organization,
            name: cmd.name.trim().to_string(),
            location: Location {
                state: cmd.location.state.trim().to_string(),
                city: cmd.location.city.trim().to_string(),
            },
            available: BTreeMap::new(),
            committed: BTreeMap::new(),
            billed: BTreeMap::new(),
            version: 0,
            created_at: cmd.occurred_at,
        })
    }

    pub fn id_typed(&self) -> WarehouseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn bucket(&self, bucket: Bucket) -> &BTreeMap<BucketKey, i64> {
        match bucket {
            Bucket::Available => &self.available,
            Bucket::Committed => &self.committed,
            Bucket::Billed => &self.billed,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut BTreeMap<BucketKey, i64> {
        match bucket {
            Bucket::Available => &mut self.available,
            Bucket::Committed => &mut self.committed,
            Bucket::Billed => &mut self.billed,
        }
    }

    /// Look up a bucket entry. `None` means absent, which is distinct from zero.
    pub fn find_entry(&self, bucket: Bucket, key: BucketKey) -> Option<i64> {
        self.bucket(bucket).get(&key).copied()
    }

    /// Quantity of an entry, treating absent as zero.
    pub fn quantity(&self, bucket: Bucket, key: BucketKey) -> i64 {
        self.find_entry(bucket, key).unwrap_or(0)
    }

    /// Apply a signed delta to one bucket entry and return the new quantity.
    ///
    /// - absent entry, `delta > 0`: the entry is created
    /// - absent entry, `delta < 0`: `NotFound`
    /// - result below zero: `InsufficientQuantity`, nothing changes
    ///
    /// Prefer [`crate::apply_postings`], which also records history and is
    /// atomic across several adjustments.
    pub fn adjust(&mut self, bucket: Bucket, key: BucketKey, delta: i64) -> DomainResult<i64> {
        if delta == 0 {
            return Err(DomainError::validation(format!(
                "{bucket} adjustment for {key} must be non-zero"
            )));
        }

        let entries = self.bucket_mut(bucket);
        let current = match entries.get(&key) {
            Some(q) => *q,
            None if delta > 0 => 0,
            None => {
                return Err(DomainError::not_found(
                    "bucket entry",
                    format!("{bucket} {key}"),
                ));
            }
        };

        let next = current
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation(format!("{bucket} quantity overflow for {key}")))?;
        if next < 0 {
            return Err(DomainError::InsufficientQuantity {
                bucket: bucket.as_str(),
                item: key.item.to_string(),
                pickup: key.pickup.to_string(),
                available: current,
                requested: -delta,
            });
        }

        if next == 0 && bucket.prunes_zero_entries() {
            entries.remove(&key);
        } else {
            entries.insert(key, next);
        }
        Ok(next)
    }

    /// Advance the version after a successful commit and return it.
    pub fn mark_committed(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    /// Every quantity in every bucket is non-negative.
    pub fn is_consistent(&self) -> bool {
        [Bucket::Available, Bucket::Committed, Bucket::Billed]
            .into_iter()
            .all(|b| self.bucket(b).values().all(|q| *q >= 0))
    }
}

impl AggregateRoot for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> WarehouseId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        self.version
    }
}
