//! Application services: one method per ledger operation.
//!
//! Every mutating operation follows the same unit of work:
//!
//! ```text
//! lock warehouse → load documents → decide (pure domain) → apply postings
//!   → commit(changes) → publish event
//! ```
//!
//! The warehouse is written with `ExpectedVersion::Exact(loaded revision)`. A
//! concurrent writer elsewhere surfaces as `StoreError::Concurrency`, and the
//! whole unit of work is retried from a fresh load.

mod bookings;
mod credit_notes;
mod history;
mod items;
mod orders;
mod purchases;
mod sales;
mod warehouses;

pub use orders::OrderFilter;
pub use purchases::PurchaseFilter;
pub use warehouses::WarehouseFilter;

use std::future::Future;

use thiserror::Error;
use tracing::warn;

use tradeflow_catalog::{InMemoryItemCatalog, Item, ItemId};
use tradeflow_core::{AggregateId, AggregateRoot, DomainError, ErrorKind, ExpectedVersion, OrganizationId};
use tradeflow_events::{EventBus, EventEnvelope};
use tradeflow_ledger::{Warehouse, WarehouseId};

use crate::config::DEFAULT_COMMIT_RETRIES;
use crate::events::{LedgerEnvelope, LedgerEvent};
use crate::locks::WarehouseLocks;
use crate::store::{ChangeSet, Document, LedgerStore, StoreError, Versioned, fetch};

/// Service-level error: a rejected transaction or a storage failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Classification for callers; `None` for storage failures other than
    /// concurrency conflicts.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Domain(e) => Some(e.kind()),
            ServiceError::Store(StoreError::Concurrency(_)) => Some(ErrorKind::Concurrency),
            ServiceError::Store(_) => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::Concurrency(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The ledger's application service.
#[derive(Debug)]
pub struct LedgerService<S, B> {
    store: S,
    bus: B,
    locks: WarehouseLocks,
    commit_retries: u32,
}

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            locks: WarehouseLocks::new(),
            commit_retries: DEFAULT_COMMIT_RETRIES,
        }
    }

    pub fn with_commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `attempt` until it succeeds, fails for a non-concurrency reason,
    /// or the retry budget is spent.
    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.commit_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %err, "commit conflict, retrying");
                }
                other => return other,
            }
        }
    }

    async fn load<D: Document>(
        &self,
        organization: OrganizationId,
        id: AggregateId,
    ) -> ServiceResult<Versioned<D>> {
        fetch::<D, _>(&self.store, organization, id)
            .await?
            .ok_or_else(|| DomainError::not_found(D::COLLECTION.entity(), id).into())
    }

    async fn load_warehouse(
        &self,
        organization: OrganizationId,
        id: WarehouseId,
    ) -> ServiceResult<Versioned<Warehouse>> {
        self.load(organization, id.aggregate_id()).await
    }

    /// Snapshot of the referenced items; unknown ids are left out so the
    /// domain reports them against the offending line.
    async fn catalog_for<I>(&self, organization: OrganizationId, items: I) -> ServiceResult<InMemoryItemCatalog>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut catalog = InMemoryItemCatalog::new();
        for id in items {
            if let Some(item) = fetch::<Item, _>(&self.store, organization, id.aggregate_id()).await? {
                catalog.insert(item.document);
            }
        }
        Ok(catalog)
    }

    /// Publish a warehouse transaction's event after commit.
    fn publish(&self, organization: OrganizationId, warehouse: &Warehouse, event: impl Into<LedgerEvent>) {
        self.publish_envelope(EventEnvelope::for_warehouse(
            organization,
            warehouse.id_typed().aggregate_id(),
            AggregateRoot::version(warehouse),
            event.into(),
        ));
    }

    /// Publication failures are logged, never returned: the commit stands.
    fn publish_envelope(&self, envelope: LedgerEnvelope) {
        let event_type = envelope.event_type();
        if let Err(err) = self.bus.publish(envelope) {
            warn!(event_type, error = ?err, "failed to publish ledger event");
        }
    }
}

/// Stage the warehouse write of a transaction that touched its buckets.
fn stage_warehouse(changes: &mut ChangeSet, warehouse: &mut Versioned<Warehouse>) -> ServiceResult<()> {
    warehouse.document.mark_committed();
    changes.put(&warehouse.document, ExpectedVersion::Exact(warehouse.revision))?;
    Ok(())
}
