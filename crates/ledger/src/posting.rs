use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tradeflow_core::{AggregateRoot, DomainError, DomainResult, OrganizationId};

use crate::bucket::{Bucket, BucketKey};
use crate::history::{EntityRef, HistoryRecord, HistorySink};
use crate::warehouse::Warehouse;

/// A single intended bucket movement, produced by a transaction's decision logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Index of the transaction line that caused the movement.
    pub line: usize,
    pub bucket: Bucket,
    pub key: BucketKey,
    pub delta: i64,
    pub source: EntityRef,
    pub destination: EntityRef,
}

impl Posting {
    pub fn new(
        line: usize,
        bucket: Bucket,
        key: BucketKey,
        delta: i64,
        source: EntityRef,
        destination: EntityRef,
    ) -> Self {
        Self {
            line,
            bucket,
            key,
            delta,
            source,
            destination,
        }
    }

    /// The compensating movement: same key, opposite sign, sides swapped.
    pub fn reversed(&self) -> Self {
        Self {
            delta: -self.delta,
            source: self.destination,
            destination: self.source,
            ..*self
        }
    }
}

/// Apply `postings` to `warehouse` in order, all or nothing.
///
/// On success the warehouse is updated and one history record per posting is
/// handed to `sink`. On failure neither the warehouse nor the sink is touched
/// and the error carries the line of the posting that failed.
pub fn apply_postings<S>(
    warehouse: &mut Warehouse,
    organization: OrganizationId,
    postings: &[Posting],
    occurred_at: DateTime<Utc>,
    sink: &mut S,
) -> DomainResult<()>
where
    S: HistorySink + ?Sized,
{
    if warehouse.organization() != organization {
        return Err(DomainError::not_found("warehouse", warehouse.id()));
    }

    let mut working = warehouse.clone();
    let mut records = Vec::with_capacity(postings.len());

    for posting in postings {
        working
            .adjust(posting.bucket, posting.key, posting.delta)
            .map_err(|e| e.at_line(posting.line))?;

        records.push(HistoryRecord {
            id: Uuid::now_v7(),
            organization,
            warehouse: warehouse.id(),
            item: posting.key.item,
            pickup: posting.key.pickup,
            source: posting.source,
            destination: posting.destination,
            quantity: posting.delta,
            bucket: posting.bucket,
            occurred_at,
        });
    }

    *warehouse = working;
    for record in records {
        sink.record(record);
    }
    Ok(())
}
