use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tradeflow_core::{AggregateId, OrganizationId};
use tradeflow_ledger::{HistoryQuery, HistoryRecord};

use super::{ChangeSet, Collection, DocumentWrite, LedgerStore, StoreError, StoreResult, StoredDocument};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct DocumentKey {
    organization: OrganizationId,
    collection: Collection,
    id: AggregateId,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<DocumentKey, StoredDocument>,
    history: Vec<HistoryRecord>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A commit validates every revision expectation
/// under one write lock before applying anything.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load(
        &self,
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
    ) -> StoreResult<Option<StoredDocument>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state
            .documents
            .get(&DocumentKey {
                organization,
                collection,
                id,
            })
            .cloned())
    }

    async fn list(
        &self,
        organization: OrganizationId,
        collection: Collection,
    ) -> StoreResult<Vec<StoredDocument>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut docs: Vec<StoredDocument> = state
            .documents
            .values()
            .filter(|d| d.organization == organization && d.collection == collection)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }

    async fn history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> StoreResult<Vec<HistoryRecord>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut records: Vec<HistoryRecord> = state
            .history
            .iter()
            .filter(|r| r.organization == organization && query.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(records)
    }

    async fn commit(&self, organization: OrganizationId, changes: ChangeSet) -> StoreResult<()> {
        changes.ensure_organization(organization)?;
        let (writes, history) = changes.into_parts();

        let mut state = self.state.write().map_err(|_| Self::poisoned())?;

        let mut touched = HashSet::new();
        for write in &writes {
            let (collection, id) = write.key();
            if !touched.insert((collection, id)) {
                return Err(StoreError::Backend(format!(
                    "{collection} {id} is written twice in one commit"
                )));
            }
            let current = state
                .documents
                .get(&DocumentKey {
                    organization,
                    collection,
                    id,
                })
                .map(|d| d.revision)
                .unwrap_or(0);
            if !write.expected().matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "{collection} {id}: expected {:?}, found {current}",
                    write.expected()
                )));
            }
            if matches!(write, DocumentWrite::Delete { .. }) && current == 0 {
                return Err(StoreError::Concurrency(format!(
                    "{collection} {id} no longer exists"
                )));
            }
        }

        for write in writes {
            match write {
                DocumentWrite::Put {
                    organization,
                    collection,
                    id,
                    body,
                    ..
                } => {
                    let key = DocumentKey {
                        organization,
                        collection,
                        id,
                    };
                    let revision = state.documents.get(&key).map(|d| d.revision).unwrap_or(0) + 1;
                    state.documents.insert(
                        key,
                        StoredDocument {
                            organization,
                            collection,
                            id,
                            revision,
                            body,
                        },
                    );
                }
                DocumentWrite::Delete {
                    organization,
                    collection,
                    id,
                    ..
                } => {
                    state.documents.remove(&DocumentKey {
                        organization,
                        collection,
                        id,
                    });
                }
            }
        }
        state.history.extend(history);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Versioned, fetch};
    use chrono::Utc;
    use tradeflow_core::ExpectedVersion;
    use tradeflow_ledger::{CreateWarehouse, Location, Warehouse, WarehouseId};

    fn warehouse(organization: OrganizationId) -> Warehouse {
        Warehouse::create(CreateWarehouse {
            organization,
            warehouse_id: WarehouseId::generate(),
            name: "Kolkata Central".to_string(),
            location: Location {
                state: "West Bengal".to_string(),
                city: "Kolkata".to_string(),
            },
            occurred_at: Utc::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn put_assigns_revisions_and_rejects_stale_writers() {
        let store = InMemoryLedgerStore::new();
        let org = OrganizationId::new();
        let w = warehouse(org);

        let mut first = ChangeSet::new();
        first.put(&w, ExpectedVersion::Exact(0)).unwrap();
        store.commit(org, first).await.unwrap();

        let loaded: Versioned<Warehouse> =
            fetch(&store, org, w.id_typed().aggregate_id()).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.document, w);

        let mut stale = ChangeSet::new();
        stale.put(&w, ExpectedVersion::Exact(0)).unwrap();
        let err = store.commit(org, stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let store = InMemoryLedgerStore::new();
        let org = OrganizationId::new();
        let a = warehouse(org);
        let b = warehouse(org);

        let mut changes = ChangeSet::new();
        changes.put(&a, ExpectedVersion::Exact(0)).unwrap();
        changes.put(&b, ExpectedVersion::Exact(3)).unwrap();
        assert!(store.commit(org, changes).await.is_err());

        assert!(store.list(org, Collection::Warehouses).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn documents_are_scoped_by_organization() {
        let store = InMemoryLedgerStore::new();
        let org = OrganizationId::new();
        let other = OrganizationId::new();
        let w = warehouse(org);

        let mut changes = ChangeSet::new();
        changes.put(&w, ExpectedVersion::Exact(0)).unwrap();
        let err = store.commit(other, changes.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::OrganizationIsolation(_)));

        store.commit(org, changes).await.unwrap();
        let id = w.id_typed().aggregate_id();
        assert!(store.load(other, Collection::Warehouses, id).await.unwrap().is_none());
        assert!(store.load(org, Collection::Warehouses, id).await.unwrap().is_some());
    }
}
