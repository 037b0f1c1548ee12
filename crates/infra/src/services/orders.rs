use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use tradeflow_core::{AggregateRoot, ExpectedVersion, OrganizationId};
use tradeflow_events::{EventBus, EventEnvelope};
use tradeflow_ledger::{Warehouse, WarehouseId, apply_postings};
use tradeflow_orders::{Order, OrderEvent, OrderId, OrderStatus, PlaceOrder, UpdateOrderDetails};

use super::{LedgerService, ServiceResult, stage_warehouse};
use crate::events::LedgerEnvelope;
use crate::store::{ChangeSet, LedgerStore, fetch_all};

/// Filters for listing orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.warehouse_id.is_none_or(|w| w == order.warehouse_id())
            && self.status.is_none_or(|s| s == order.status())
    }
}

impl<S, B> LedgerService<S, B>
where
    S: LedgerStore,
    B: EventBus<LedgerEnvelope>,
{
    /// Place an order: every line grows the available bucket.
    pub async fn place_order(&self, cmd: PlaceOrder) -> ServiceResult<Order> {
        let organization = cmd.organization;
        let _guard = self.locks.acquire(organization, cmd.warehouse_id).await;

        let cmd = &cmd;
        let (order, warehouse, event) = self
            .with_retries("place_order", move || self.attempt_place_order(cmd))
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %order.warehouse_id(),
            order_id = %order.id_typed(),
            lines = order.lines().len(),
            "order placed"
        );
        self.publish(organization, &warehouse, event);
        Ok(order)
    }

    async fn attempt_place_order(
        &self,
        cmd: &PlaceOrder,
    ) -> ServiceResult<(Order, Warehouse, OrderEvent)> {
        let organization = cmd.organization;
        let mut warehouse = self.load_warehouse(organization, cmd.warehouse_id).await?;
        let catalog = self
            .catalog_for(organization, cmd.lines.iter().map(|l| l.item).collect::<Vec<_>>())
            .await?;

        let (order, postings, event) = Order::place(cmd.clone(), &catalog)?;

        let mut changes = ChangeSet::new();
        apply_postings(
            &mut warehouse.document,
            organization,
            &postings,
            cmd.occurred_at,
            &mut changes,
        )?;
        stage_warehouse(&mut changes, &mut warehouse)?;
        changes.put(&order, ExpectedVersion::Exact(0))?;
        self.store.commit(organization, changes).await?;

        Ok((order, warehouse.document, event))
    }

    pub async fn get_order(&self, organization: OrganizationId, id: OrderId) -> ServiceResult<Order> {
        Ok(self.load::<Order>(organization, id.aggregate_id()).await?.document)
    }

    pub async fn list_orders(
        &self,
        organization: OrganizationId,
        filter: &OrderFilter,
    ) -> ServiceResult<Vec<Order>> {
        let mut orders: Vec<Order> = fetch_all(&self.store, organization).await?;
        orders.retain(|o| filter.matches(o));
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    /// Edit an order's metadata. Quantities and status are untouched.
    pub async fn update_order_details(&self, cmd: UpdateOrderDetails) -> ServiceResult<Order> {
        let organization = cmd.organization;
        let cmd = &cmd;
        let (order, event) = self
            .with_retries("update_order_details", move || async move {
                let mut loaded = self
                    .load::<Order>(organization, cmd.order_id.aggregate_id())
                    .await?;
                let event = loaded.document.update_details(cmd.clone())?;

                let mut changes = ChangeSet::new();
                changes.put(&loaded.document, ExpectedVersion::Exact(loaded.revision))?;
                self.store.commit(organization, changes).await?;
                Ok((loaded.document, event))
            })
            .await?;

        info!(organization_id = %organization, order_id = %order.id_typed(), "order details updated");
        self.publish_envelope(EventEnvelope::new(
            Uuid::now_v7(),
            organization,
            order.id_typed().aggregate_id(),
            "order",
            order.version(),
            event.into(),
        ));
        Ok(order)
    }

    /// Delete an order, taking its full ordered quantity back out of available.
    pub async fn delete_order(
        &self,
        organization: OrganizationId,
        id: OrderId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Order> {
        let warehouse_id = self.get_order(organization, id).await?.warehouse_id();
        let _guard = self.locks.acquire(organization, warehouse_id).await;

        let (order, warehouse, event) = self
            .with_retries("delete_order", move || async move {
                let loaded = self.load::<Order>(organization, id.aggregate_id()).await?;
                let order = loaded.document;
                let mut warehouse = self.load_warehouse(organization, order.warehouse_id()).await?;

                let postings = order.removal_postings()?;
                let mut changes = ChangeSet::new();
                apply_postings(
                    &mut warehouse.document,
                    organization,
                    &postings,
                    occurred_at,
                    &mut changes,
                )?;
                stage_warehouse(&mut changes, &mut warehouse)?;
                changes.delete(&order, ExpectedVersion::Exact(loaded.revision));
                self.store.commit(organization, changes).await?;

                let event = order.removed_event(occurred_at);
                Ok((order, warehouse.document, event))
            })
            .await?;

        info!(
            organization_id = %organization,
            warehouse_id = %warehouse.id_typed(),
            order_id = %order.id_typed(),
            "order deleted"
        );
        self.publish(organization, &warehouse, event);
        Ok(order)
    }
}
