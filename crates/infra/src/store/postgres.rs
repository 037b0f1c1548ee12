//! Postgres-backed ledger store.
//!
//! Documents live in `ledger_documents` as JSONB keyed by
//! `(organization_id, collection, id)` with a `revision` column; history lives
//! in the append-only `item_history` table. A commit is one SQL transaction:
//! every touched document row is locked with `SELECT ... FOR UPDATE` (in key
//! order), revisions are checked, then documents and history are written.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Concurrency` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed, RowNotFound, Other | N/A | `Backend` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use tradeflow_catalog::{ItemId, Pickup};
use tradeflow_core::{AggregateId, OrganizationId};
use tradeflow_ledger::{Bucket, EntityKind, EntityRef, HistoryQuery, HistoryRecord, WarehouseId};

use super::{ChangeSet, Collection, DocumentWrite, LedgerStore, StoreError, StoreResult, StoredDocument};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ledger_documents (
        organization_id UUID NOT NULL,
        collection TEXT NOT NULL,
        id UUID NOT NULL,
        revision BIGINT NOT NULL CHECK (revision > 0),
        body JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (organization_id, collection, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS item_history (
        id UUID PRIMARY KEY,
        organization_id UUID NOT NULL,
        warehouse_id UUID NOT NULL,
        item_id UUID NOT NULL,
        pickup TEXT NOT NULL,
        bucket TEXT NOT NULL,
        quantity BIGINT NOT NULL,
        source_kind TEXT NOT NULL,
        source_id UUID NOT NULL,
        destination_kind TEXT NOT NULL,
        destination_id UUID NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS item_history_org_time
        ON item_history (organization_id, occurred_at DESC, id DESC)
    "#,
];

/// Postgres-backed ledger store.
///
/// Every query includes `organization_id` in its WHERE clause.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url` and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self),
        fields(organization_id = %organization, collection = %collection, id = %id),
        err
    )]
    async fn load(
        &self,
        organization: OrganizationId,
        collection: Collection,
        id: AggregateId,
    ) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(
            r#"
            SELECT organization_id, collection, id, revision, body
            FROM ledger_documents
            WHERE organization_id = $1 AND collection = $2 AND id = $3
            "#,
        )
        .bind(organization.as_uuid())
        .bind(collection.as_str())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load", e))?;

        row.map(|row| {
            DocumentRow::from_row(&row)
                .map_err(|e| StoreError::Serialization(format!("failed to read document row: {e}")))
                .and_then(StoredDocument::try_from)
        })
        .transpose()
    }

    #[instrument(
        skip(self),
        fields(organization_id = %organization, collection = %collection),
        err
    )]
    async fn list(
        &self,
        organization: OrganizationId,
        collection: Collection,
    ) -> StoreResult<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT organization_id, collection, id, revision, body
            FROM ledger_documents
            WHERE organization_id = $1 AND collection = $2
            ORDER BY id ASC
            "#,
        )
        .bind(organization.as_uuid())
        .bind(collection.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        let docs = rows
            .iter()
            .map(|row| {
                DocumentRow::from_row(row)
                    .map_err(|e| {
                        StoreError::Serialization(format!("failed to read document row: {e}"))
                    })
                    .and_then(StoredDocument::try_from)
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Span::current().record("document_count", docs.len());
        Ok(docs)
    }

    #[instrument(skip(self), fields(organization_id = %organization), err)]
    async fn history(
        &self,
        organization: OrganizationId,
        query: &HistoryQuery,
    ) -> StoreResult<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, organization_id, warehouse_id, item_id, pickup, bucket, quantity,
                   source_kind, source_id, destination_kind, destination_id, occurred_at
            FROM item_history
            WHERE organization_id = $1
                AND ($2::uuid IS NULL OR item_id = $2)
                AND ($3::text IS NULL OR bucket = $3)
                AND ($4::text IS NULL OR pickup = $4)
            ORDER BY occurred_at DESC, id DESC
            "#,
        )
        .bind(organization.as_uuid())
        .bind(query.item.map(|i| *i.aggregate_id().as_uuid()))
        .bind(query.bucket.map(Bucket::as_str))
        .bind(query.pickup.map(Pickup::as_str))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter()
            .map(|row| {
                HistoryRow::from_row(row)
                    .map_err(|e| StoreError::Serialization(format!("failed to read history row: {e}")))
                    .and_then(HistoryRecord::try_from)
            })
            .collect()
    }

    #[instrument(
        skip(self, changes),
        fields(
            organization_id = %organization,
            write_count = changes.writes().len(),
            history_count = changes.history().len()
        ),
        err
    )]
    async fn commit(&self, organization: OrganizationId, changes: ChangeSet) -> StoreResult<()> {
        changes.ensure_organization(organization)?;
        let (mut writes, history) = changes.into_parts();
        writes.sort_by_key(DocumentWrite::key);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for write in &writes {
            let (collection, id) = write.key();
            let current = lock_revision(&mut tx, organization, collection, id).await?;
            let expected = write.expected();
            let missing_delete = matches!(write, DocumentWrite::Delete { .. }) && current == 0;
            if !expected.matches(current) || missing_delete {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Concurrency(format!(
                    "{collection} {id}: expected {expected:?}, found {current}"
                )));
            }
        }

        for write in writes {
            match write {
                DocumentWrite::Put {
                    collection, id, body, ..
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO ledger_documents (organization_id, collection, id, revision, body)
                        VALUES ($1, $2, $3, 1, $4)
                        ON CONFLICT (organization_id, collection, id)
                        DO UPDATE SET
                            revision = ledger_documents.revision + 1,
                            body = EXCLUDED.body,
                            updated_at = NOW()
                        "#,
                    )
                    .bind(organization.as_uuid())
                    .bind(collection.as_str())
                    .bind(id.as_uuid())
                    .bind(&body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("put_document", e))?;
                }
                DocumentWrite::Delete { collection, id, .. } => {
                    sqlx::query(
                        r#"
                        DELETE FROM ledger_documents
                        WHERE organization_id = $1 AND collection = $2 AND id = $3
                        "#,
                    )
                    .bind(organization.as_uuid())
                    .bind(collection.as_str())
                    .bind(id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("delete_document", e))?;
                }
            }
        }

        for record in &history {
            sqlx::query(
                r#"
                INSERT INTO item_history (
                    id, organization_id, warehouse_id, item_id, pickup, bucket, quantity,
                    source_kind, source_id, destination_kind, destination_id, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(record.id)
            .bind(record.organization.as_uuid())
            .bind(record.warehouse.aggregate_id().as_uuid())
            .bind(record.item.aggregate_id().as_uuid())
            .bind(record.pickup.as_str())
            .bind(record.bucket.as_str())
            .bind(record.quantity)
            .bind(entity_kind_str(record.source.kind))
            .bind(record.source.id.as_uuid())
            .bind(entity_kind_str(record.destination.kind))
            .bind(record.destination.id.as_uuid())
            .bind(record.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_history", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

/// Lock a document row and return its revision (0 if it does not exist).
async fn lock_revision(
    tx: &mut Transaction<'_, Postgres>,
    organization: OrganizationId,
    collection: Collection,
    id: AggregateId,
) -> StoreResult<u64> {
    let row = sqlx::query(
        r#"
        SELECT revision
        FROM ledger_documents
        WHERE organization_id = $1 AND collection = $2 AND id = $3
        FOR UPDATE
        "#,
    )
    .bind(organization.as_uuid())
    .bind(collection.as_str())
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_revision", e))?;

    match row {
        Some(row) => {
            let revision: i64 = row
                .try_get("revision")
                .map_err(|e| StoreError::Serialization(format!("failed to read revision: {e}")))?;
            Ok(revision as u64)
        }
        None => Ok(0),
    }
}

fn entity_kind_str(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Order => "order",
        EntityKind::Warehouse => "warehouse",
        EntityKind::Buyer => "buyer",
        EntityKind::Manufacturer => "manufacturer",
    }
}

fn parse_entity_kind(s: &str) -> StoreResult<EntityKind> {
    match s {
        "order" => Ok(EntityKind::Order),
        "warehouse" => Ok(EntityKind::Warehouse),
        "buyer" => Ok(EntityKind::Buyer),
        "manufacturer" => Ok(EntityKind::Manufacturer),
        other => Err(StoreError::Serialization(format!("unknown entity kind '{other}'"))),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct DocumentRow {
    organization_id: Uuid,
    collection: String,
    id: Uuid,
    revision: i64,
    body: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for DocumentRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(DocumentRow {
            organization_id: row.try_get("organization_id")?,
            collection: row.try_get("collection")?,
            id: row.try_get("id")?,
            revision: row.try_get("revision")?,
            body: row.try_get("body")?,
        })
    }
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(StoredDocument {
            organization: OrganizationId::from_uuid(row.organization_id),
            collection: row.collection.parse()?,
            id: AggregateId::from_uuid(row.id),
            revision: row.revision as u64,
            body: row.body,
        })
    }
}

#[derive(Debug)]
struct HistoryRow {
    id: Uuid,
    organization_id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    pickup: String,
    bucket: String,
    quantity: i64,
    source_kind: String,
    source_id: Uuid,
    destination_kind: String,
    destination_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for HistoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryRow {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            item_id: row.try_get("item_id")?,
            pickup: row.try_get("pickup")?,
            bucket: row.try_get("bucket")?,
            quantity: row.try_get("quantity")?,
            source_kind: row.try_get("source_kind")?,
            source_id: row.try_get("source_id")?,
            destination_kind: row.try_get("destination_kind")?,
            destination_id: row.try_get("destination_id")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<HistoryRow> for HistoryRecord {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let serialization = |e: tradeflow_core::DomainError| StoreError::Serialization(e.to_string());
        Ok(HistoryRecord {
            id: row.id,
            organization: OrganizationId::from_uuid(row.organization_id),
            warehouse: WarehouseId::new(AggregateId::from_uuid(row.warehouse_id)),
            item: ItemId::new(AggregateId::from_uuid(row.item_id)),
            pickup: row.pickup.parse().map_err(serialization)?,
            source: EntityRef::new(
                parse_entity_kind(&row.source_kind)?,
                AggregateId::from_uuid(row.source_id),
            ),
            destination: EntityRef::new(
                parse_entity_kind(&row.destination_kind)?,
                AggregateId::from_uuid(row.destination_id),
            ),
            quantity: row.quantity,
            bucket: row.bucket.parse().map_err(serialization)?,
            occurred_at: row.occurred_at,
        })
    }
}
