use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_catalog::{ItemCatalog, ItemId, ManufacturerId, Pickup};
use tradeflow_core::{
    AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id, checked_total,
};
use tradeflow_events::Event;
use tradeflow_ledger::{Bucket, BucketKey, EntityRef, Posting, WarehouseId};

aggregate_id!(
    /// A manufacturer order.
    OrderId
);

/// Fulfilment status, derived from the lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "partially paid")]
    PartiallyPaid,
    #[serde(rename = "billed")]
    Billed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::PartiallyPaid => "partially paid",
            OrderStatus::Billed => "billed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: ItemId,
    pub pickup: Pickup,
    pub ordered_quantity: i64,
    pub purchased_quantity: i64,
}

impl OrderLine {
    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.item, self.pickup)
    }

    pub fn outstanding(&self) -> i64 {
        self.ordered_quantity - self.purchased_quantity
    }
}

/// Free-form metadata; never affects quantities or status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(default)]
    pub bargain_no: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transport_notes: Option<String>,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    organization: OrganizationId,
    warehouse_id: WarehouseId,
    manufacturer_id: ManufacturerId,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    details: OrderDetails,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item: ItemId,
    pub pickup: Pickup,
    pub quantity: i64,
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub organization: OrganizationId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub manufacturer_id: ManufacturerId,
    pub lines: Vec<OrderLineRequest>,
    pub details: OrderDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateOrderDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderDetails {
    pub organization: OrganizationId,
    pub order_id: OrderId,
    pub details: OrderDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub organization: OrganizationId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub manufacturer_id: ManufacturerId,
    pub total_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetailsUpdated {
    pub organization: OrganizationId,
    pub order_id: OrderId,
    pub details: OrderDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRemoved {
    pub organization: OrganizationId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderDetailsUpdated(OrderDetailsUpdated),
    OrderRemoved(OrderRemoved),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderDetailsUpdated(_) => "orders.order.details_updated",
            OrderEvent::OrderRemoved(_) => "orders.order.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderDetailsUpdated(e) => e.occurred_at,
            OrderEvent::OrderRemoved(e) => e.occurred_at,
        }
    }
}

impl Order {
    /// Validate and place a new order.
    ///
    /// Returns the order (every line with `purchased_quantity = 0`) and one
    /// `Available +ordered` posting per line.
    pub fn place<C>(cmd: PlaceOrder, catalog: &C) -> DomainResult<(Self, Vec<Posting>, OrderEvent)>
    where
        C: ItemCatalog + ?Sized,
    {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one line"));
        }

        let mut seen = BTreeSet::new();
        for (line, req) in cmd.lines.iter().enumerate() {
            ensure_positive(req.quantity).map_err(|e| e.at_line(line))?;
            catalog
                .get_item(cmd.organization, req.item)
                .map_err(|e| e.at_line(line))?;
            if !seen.insert(BucketKey::new(req.item, req.pickup)) {
                return Err(DomainError::validation(format!(
                    "item {} at {} appears on more than one line",
                    req.item, req.pickup
                ))
                .at_line(line));
            }
        }
        let total_quantity = checked_total(cmd.lines.iter().map(|l| l.quantity))?;

        let lines: Vec<OrderLine> = cmd
            .lines
            .iter()
            .map(|req| OrderLine {
                item: req.item,
                pickup: req.pickup,
                ordered_quantity: req.quantity,
                purchased_quantity: 0,
            })
            .collect();

        let source = EntityRef::manufacturer(cmd.manufacturer_id);
        let destination = EntityRef::warehouse(cmd.warehouse_id);
        let postings = lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                Posting::new(i, Bucket::Available, l.key(), l.ordered_quantity, source, destination)
            })
            .collect();

        let event = OrderEvent::OrderPlaced(OrderPlaced {
            organization: cmd.organization,
            order_id: cmd.order_id,
            warehouse_id: cmd.warehouse_id,
            manufacturer_id: cmd.manufacturer_id,
            total_quantity,
            occurred_at: cmd.occurred_at,
        });

        let order = Self {
            id: cmd.order_id,
            organization: cmd.organization,
            warehouse_id: cmd.warehouse_id,
            manufacturer_id: cmd.manufacturer_id,
            lines,
            status: OrderStatus::Created,
            details: cmd.details,
            version: 0,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        };
        Ok((order, postings, event))
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn manufacturer_id(&self) -> ManufacturerId {
        self.manufacturer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn details(&self) -> &OrderDetails {
        &self.details
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn find_line(&self, key: BucketKey) -> Option<(usize, &OrderLine)> {
        self.lines.iter().enumerate().find(|(_, l)| l.key() == key)
    }

    /// Postings that undo the order's inventory effect.
    ///
    /// Reverses the full ordered quantity of every line. An order that has
    /// already been (partly) purchased cannot be removed.
    pub fn removal_postings(&self) -> DomainResult<Vec<Posting>> {
        if let Some((line, _)) = self
            .lines
            .iter()
            .enumerate()
            .find(|(_, l)| l.purchased_quantity > 0)
        {
            return Err(DomainError::state_conflict(format!(
                "order {} has purchases recorded against it; delete the purchases first",
                self.id
            ))
            .at_line(line));
        }

        let source = EntityRef::warehouse(self.warehouse_id);
        let destination = EntityRef::manufacturer(self.manufacturer_id);
        Ok(self
            .lines
            .iter()
            .enumerate()
            .map(|(i, l)| {
                Posting::new(i, Bucket::Available, l.key(), -l.ordered_quantity, source, destination)
            })
            .collect())
    }

    pub fn removed_event(&self, occurred_at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::OrderRemoved(OrderRemoved {
            organization: self.organization,
            order_id: self.id,
            warehouse_id: self.warehouse_id,
            occurred_at,
        })
    }

    pub fn update_details(&mut self, cmd: UpdateOrderDetails) -> DomainResult<OrderEvent> {
        self.ensure_organization(cmd.organization)?;
        if cmd.order_id != self.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }

        self.details = cmd.details.clone();
        self.touch(cmd.occurred_at);
        Ok(OrderEvent::OrderDetailsUpdated(OrderDetailsUpdated {
            organization: cmd.organization,
            order_id: cmd.order_id,
            details: cmd.details,
            occurred_at: cmd.occurred_at,
        }))
    }

    /// Count `quantity` against the line keyed by `key`, returning the line index.
    ///
    /// Fails with `NotFound` if the order has no such line and `OverPurchase`
    /// if the line would be purchased beyond its ordered quantity. The status
    /// is refreshed on success.
    pub fn register_purchase(
        &mut self,
        key: BucketKey,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> DomainResult<usize> {
        ensure_positive(quantity)?;
        let id = self.id;
        let (index, line) = self
            .lines
            .iter_mut()
            .enumerate()
            .find(|(_, l)| l.key() == key)
            .ok_or_else(|| DomainError::not_found("order line", format!("{id} {key}")))?;

        let next = line
            .purchased_quantity
            .checked_add(quantity)
            .filter(|next| *next <= line.ordered_quantity);
        let Some(next) = next else {
            return Err(DomainError::OverPurchase {
                item: key.item.to_string(),
                pickup: key.pickup.to_string(),
                ordered: line.ordered_quantity,
                purchased: line.purchased_quantity,
                requested: quantity,
            });
        };
        line.purchased_quantity = next;

        self.refresh_status();
        self.touch(at);
        Ok(index)
    }

    /// Rebuild every line's purchased quantity from the given purchase lines.
    ///
    /// Used after a purchase is deleted so the status reflects only the
    /// purchases that remain.
    pub fn recompute_from<I>(&mut self, purchased: I, at: DateTime<Utc>) -> DomainResult<()>
    where
        I: IntoIterator<Item = (BucketKey, i64)>,
    {
        let mut totals: BTreeMap<BucketKey, i64> = BTreeMap::new();
        for (key, quantity) in purchased {
            let total = totals.entry(key).or_default();
            *total = total.checked_add(quantity).ok_or_else(|| {
                DomainError::invariant(format!("remaining purchases overflow for {key}"))
            })?;
        }

        for (key, total) in &totals {
            match self.find_line(*key) {
                Some((_, line)) if *total > line.ordered_quantity => {
                    return Err(DomainError::invariant(format!(
                        "remaining purchases exceed the ordered quantity for {key}"
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(DomainError::invariant(format!(
                        "purchase references {key} which is not on order {}",
                        self.id
                    )));
                }
            }
        }

        for line in &mut self.lines {
            line.purchased_quantity = totals.get(&line.key()).copied().unwrap_or(0);
        }
        self.refresh_status();
        self.touch(at);
        Ok(())
    }

    fn refresh_status(&mut self) {
        self.status = if self
            .lines
            .iter()
            .all(|l| l.purchased_quantity == l.ordered_quantity)
        {
            OrderStatus::Billed
        } else if self.lines.iter().any(|l| l.purchased_quantity > 0) {
            OrderStatus::PartiallyPaid
        } else {
            OrderStatus::Created
        };
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = at;
    }

    fn ensure_organization(&self, organization: OrganizationId) -> DomainResult<()> {
        if self.organization != organization {
            return Err(DomainError::not_found("order", self.id));
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> OrderId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        self.version
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be positive (got {quantity})"
        )));
    }
    Ok(())
}
