//! Document storage for the ledger.
//!
//! Every transaction document (warehouse, order, booking, ...) is stored as a
//! JSON body under `(organization, collection, id)` with a store-managed
//! revision. A transaction's writes and its history records are handed to
//! [`LedgerStore::commit`] as one [`ChangeSet`] and land together or not at all.

mod document;
mod in_memory;
mod postgres;

pub use document::{Collection, Document, Versioned};
pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tradeflow_core::{AggregateId, ExpectedVersion, OrganizationId};
use tradeflow_ledger::{HistoryQuery, HistoryRecord, HistorySink};

/// A document as persisted: body plus the revision the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub organization: OrganizationId,
    pub collection: Collection,
    pub id: AggregateId,
    /// Number of committed writes to this document (never 0 once stored).
    pub revision: u64,
    pub body: JsonValue,
}

/// One pending write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentWrite {
    Put {
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
        expected: ExpectedVersion,
        body: JsonValue,
    },
    Delete {
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
        expected: ExpectedVersion,
    },
}

impl DocumentWrite {
    pub fn organization(&self) -> OrganizationId {
        match self {
            DocumentWrite::Put { organization, .. } | DocumentWrite::Delete { organization, .. } => {
                *organization
            }
        }
    }

    pub fn key(&self) -> (Collection, AggregateId) {
        match self {
            DocumentWrite::Put { collection, id, .. } | DocumentWrite::Delete { collection, id, .. } => {
                (*collection, *id)
            }
        }
    }

    pub fn expected(&self) -> ExpectedVersion {
        match self {
            DocumentWrite::Put { expected, .. } | DocumentWrite::Delete { expected, .. } => *expected,
        }
    }
}

/// The unit of work of one ledger transaction.
///
/// Revision expectations: `Exact(0)` means "must not exist yet"; `Exact(n)`
/// means "must still be at revision n". History records are appended in the
/// same commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    writes: Vec<DocumentWrite>,
    history: Vec<HistoryRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert or overwrite of `doc`.
    pub fn put<D: Document>(&mut self, doc: &D, expected: ExpectedVersion) -> StoreResult<&mut Self> {
        let body = serde_json::to_value(doc).map_err(|e| {
            StoreError::Serialization(format!("{} {}: {e}", D::COLLECTION, doc.document_id()))
        })?;
        self.writes.push(DocumentWrite::Put {
            organization: doc.organization(),
            collection: D::COLLECTION,
            id: doc.document_id(),
            expected,
            body,
        });
        Ok(self)
    }

    /// Stage the removal of `doc`.
    pub fn delete<D: Document>(&mut self, doc: &D, expected: ExpectedVersion) -> &mut Self {
        self.writes.push(DocumentWrite::Delete {
            organization: doc.organization(),
            collection: D::COLLECTION,
            id: doc.document_id(),
            expected,
        });
        self
    }

    pub fn writes(&self) -> &[DocumentWrite] {
        &self.writes
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.history.is_empty()
    }

    pub fn into_parts(self) -> (Vec<DocumentWrite>, Vec<HistoryRecord>) {
        (self.writes, self.history)
    }

    /// Reject writes or history that belong to another organization.
    pub fn ensure_organization(&self, organization: OrganizationId) -> StoreResult<()> {
        if let Some(w) = self.writes.iter().find(|w| w.organization() != organization) {
            let (collection, id) = w.key();
            return Err(StoreError::OrganizationIsolation(format!(
                "{collection} {id} belongs to another organization"
            )));
        }
        if let Some(r) = self.history.iter().find(|r| r.organization != organization) {
            return Err(StoreError::OrganizationIsolation(format!(
                "history record {} belongs to another organization",
                r.id
            )));
        }
        Ok(())
    }
}

impl HistorySink for ChangeSet {
    fn record(&mut self, entry: HistoryRecord) {
        self.history.push(entry);
    }
}

/// Storage operation error.
///
/// These are infrastructure errors, as opposed to domain errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("organization isolation violation: {0}")]
    OrganizationIsolation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ledger persistence.
///
/// Every read is scoped by organization; documents of other organizations are
/// invisible.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load(
        &self,
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
    ) -> StoreResult<Option<StoredDocument>>;

    async fn list(
        &self,
        organization: OrganizationId,
        collection: Collection,
    ) -> StoreResult<Vec<StoredDocument>>;

    /// History matching `query`, newest first.
    async fn history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> StoreResult<Vec<HistoryRecord>>;

    /// Apply every write and append every history record atomically.
    async fn commit(&self, organization: OrganizationId, changes: ChangeSet) -> StoreResult<()>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn load(
        &self,
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
    ) -> StoreResult<Option<StoredDocument>> {
        (**self).load(organization, collection, id).await
    }

    async fn list(
        &self,
        organization: OrganizationId,
        collection: Collection,
    ) -> StoreResult<Vec<StoredDocument>> {
        (**self).list(organization, collection).await
    }

    async fn history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> StoreResult<Vec<HistoryRecord>> {
        (**self).history(organization, query).await
    }

    async fn commit(&self, organization: OrganizationId, changes: ChangeSet) -> StoreResult<()> {
        (**self).commit(organization, changes).await
    }
}

/// Load and decode one typed document.
pub async fn fetch<D, S>(
    store: &S,
    organization: OrganizationId,
    id: AggregateId,
) -> StoreResult<Option<Versioned<D>>>
where
    D: Document,
    S: LedgerStore + ?Sized,
{
    match store.load(organization, D::COLLECTION, id).await? {
        Some(stored) => Versioned::decode(stored).map(Some),
        None => Ok(None),
    }
}

/// Load and decode every document of one collection.
pub async fn fetch_all<D, S>(store: &S, organization: OrganizationId) -> StoreResult<Vec<D>>
where
    D: Document,
    S: LedgerStore + ?Sized,
{
    store
        .list(organization, D::COLLECTION)
        .await?
        .into_iter()
        .map(|stored| Versioned::<D>::decode(stored).map(|v| v.document))
        .collect()
}
