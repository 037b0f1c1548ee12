use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use tradeflow_core::{ExpectedVersion, OrganizationId};
use tradeflow_events::EventBus;
use tradeflow_ledger::{Warehouse, apply_postings};
use tradeflow_orders::{Order, OrderId};
use tradeflow_purchases::{Purchase, PurchaseEvent, PurchaseId, RecordPurchase};

use super::{LedgerService, ServiceResult, stage_warehouse};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

/// Filters for listing purchases. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PurchaseFilter {
    pub order_id: Option<OrderId>,
    pub invoice_from: Option<NaiveDate>,
    pub invoice_to: Option<NaiveDate>,
}

impl PurchaseFilter {
    pub fn matches(&self, purchase: &Purchase) -> bool {
        self.order_id.is_none_or(|o| o == purchase.order_id())
            && self.invoice_from.is_none_or(|d| purchase.invoice_date() >= d)
            && self.invoice_to.is_none_or(|d| purchase.invoice_date() <= d)
    }
}

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Record a purchase against an order: available → billed per line, and
    /// the order's purchased counters and status advance in the same commit.
    pub async fn record_purchase(&self, cmd: RecordPurchase) -> ServiceResult<Purchase> {
        let organization = cmd.organization;
        let _guard = self.locks.acquire(organization, cmd.warehouse_id).await;

        let cmd = &cmd;
        let (purchase, order, warehouse, event) = self
            .with_retries("record_purchase", move || self.attempt_record_purchase(cmd))
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %purchase.warehouse_id(),
            purchase_id = %purchase.id_typed(),
            order_id = %order.id_typed(),
            order_status = %order.status(),
            quantity = purchase.total_quantity(),
            "purchase recorded"
        );
        self.publish(organization, &warehouse, event);
        Ok(purchase)
    }

    async fn attempt_record_purchase(
        &self,
        cmd: &RecordPurchase,
    ) -> ServiceResult<(Purchase, Order, Warehouse, PurchaseEvent)> {
        let organization = cmd.organization;
        let mut order = self
            .load::<Order>(organization, cmd.order_id.aggregate_id())
            .await?;
        let mut warehouse = self.load_warehouse(organization, cmd.warehouse_id).await?;

        let (purchase, postings, event) = Purchase::record(cmd.clone(), &mut order.document)?;

        let mut changes = ChangeSet::new();
        apply_postings(
            &mut warehouse.document,
            organization,
            &postings,
            cmd.occurred_at,
            &mut changes,
        )?;
        stage_warehouse(&mut changes, &mut warehouse)?;
        changes.put(&order.document, ExpectedVersion::Exact(order.revision))?;
        changes.put(&purchase, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        Ok((purchase, order.document, warehouse.document, event))
    }

    /// Delete a purchase: billed → available per line, and the order is
    /// recomputed from the purchases that remain.
    pub async fn delete_purchase(
        &self,
        organization: OrganizationId,
        id: PurchaseId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Purchase> {
        let warehouse_id = self.get_purchase(organization, id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let (purchase, order, warehouse, event) = self
            .with_retries("delete_purchase", move || {
                self.attempt_delete_purchase(organization, id, occurred_at)
            })
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %warehouse.id_typed(),
            purchase_id = %purchase.id_typed(),
            order_id = %order.id_typed(),
            order_status = %order.status(),
            "purchase deleted"
        );
        self.publish(organization, &warehouse, event);
        Ok(purchase)
    }

    async fn attempt_delete_purchase(
        &self,
        organization: OrganizationId,
        id: PurchaseId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<(Purchase, Order, Warehouse, PurchaseEvent)> {
        let loaded = self.load::<Purchase>(organization, id.aggregate_id()).await?;
        let purchase = loaded.document;
        let mut order = self
            .load::<Order>(organization, purchase.order_id().aggregate_id())
            .await?;
        let mut warehouse = self.load_warehouse(organization, purchase.warehouse_id()).await?;
        let remaining = self
            .list_purchases(
                organization,
                &PurchaseFilter {
                    order_id: Some(purchase.order_id()),
                    ..PurchaseFilter::default()
                },
            )
            .await?;

        let (postings, event) = purchase.reverse(&mut order.document, &remaining, occurred_at)?;

        let mut changes = ChangeSet::new();
        apply_postings(
            &mut warehouse.document,
            organization,
            &postings,
            occurred_at,
            &mut changes,
        )?;
        stage_warehouse(&mut changes, &mut warehouse)?;
        changes.put(&order.document, ExpectedVersion::Exact(order.revision))?;
        changes.delete(&purchase, ExpectedVersion::Exact(loaded.revision));
        self.store.commit(organization, changes).await?;

        Ok((purchase, order.document, warehouse.document, event))
    }

    pub async fn get_purchase(
        &self,
        organization: OrganizationId,
        id: PurchaseId,
    ) -> ServiceResult<Purchase> {
        Ok(self.load::<Purchase>(organization, id.aggregate_id()).await?.document)
    }

    /// Purchases ordered by invoice date, newest first.
    pub async fn list_purchases(
        &self,
        organization: OrganizationId,
        filter: &PurchaseFilter,
    ) -> ServiceResult<Vec<Purchase>> {
        let mut purchases: Vec<Purchase> = fetch_all(&self.store, organization).await?;
        purchases.retain(|p| filter.matches(p));
        purchases.sort_by_key(|p| std::cmp::Reverse((p.invoice_date(), p.created_at())));
        Ok(purchases)
    }
}
