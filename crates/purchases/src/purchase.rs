use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_catalog::{ItemId, Pickup, TransporterId};
use tradeflow_core::{
    AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id, checked_total, saturating_total,
};
use tradeflow_events::Event;
use tradeflow_ledger::{Bucket, BucketKey, EntityRef, Posting, WarehouseId};
use tradeflow_orders::{Order, OrderId, OrderStatus};

aggregate_id!(
    /// A purchase (receipt) record.
    PurchaseId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub item: ItemId,
    pub pickup: Pickup,
    pub quantity: i64,
}

impl PurchaseLine {
    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.item, self.pickup)
    }
}

/// Immutable once recorded; removable only through [`Purchase::reverse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    id: PurchaseId,
    organization: OrganizationId,
    warehouse_id: WarehouseId,
    order_id: OrderId,
    transporter_id: Option<TransporterId>,
    invoice_no: String,
    invoice_date: NaiveDate,
    lines: Vec<PurchaseLine>,
    created_at: DateTime<Utc>,
}

/// Command: RecordPurchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub organization: OrganizationId,
    pub purchase_id: PurchaseId,
    pub warehouse_id: WarehouseId,
    pub order_id: OrderId,
    pub transporter_id: Option<TransporterId>,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecorded {
    pub organization: OrganizationId,
    pub purchase_id: PurchaseId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub total_quantity: i64,
    pub order_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReversed {
    pub organization: OrganizationId,
    pub purchase_id: PurchaseId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub total_quantity: i64,
    pub order_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    PurchaseRecorded(PurchaseRecorded),
    PurchaseReversed(PurchaseReversed),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseRecorded(_) => "purchases.purchase.recorded",
            PurchaseEvent::PurchaseReversed(_) => "purchases.purchase.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseRecorded(e) => e.occurred_at,
            PurchaseEvent::PurchaseReversed(e) => e.occurred_at,
        }
    }
}

impl Purchase {
    /// Record a purchase against `order`.
    ///
    /// Every line must match an order line by (item, pickup) and may not push
    /// that line past its ordered quantity. On success `order` carries the new
    /// purchased counters and derived status; on failure it is unchanged.
    pub fn record(
        cmd: RecordPurchase,
        order: &mut Order,
    ) -> DomainResult<(Self, Vec<Posting>, PurchaseEvent)> {
        if order.organization() != cmd.organization || order.id_typed() != cmd.order_id {
            return Err(DomainError::not_found("order", cmd.order_id));
        }
        if order.status() == OrderStatus::Billed {
            return Err(DomainError::OrderAlreadyBilled(order.id_typed().to_string()));
        }
        if order.warehouse_id() != cmd.warehouse_id {
            return Err(DomainError::validation(format!(
                "order {} delivers to warehouse {}, not {}",
                order.id_typed(),
                order.warehouse_id(),
                cmd.warehouse_id
            )));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a purchase needs at least one line"));
        }
        if cmd.invoice_no.trim().is_empty() {
            return Err(DomainError::validation("invoice number cannot be empty"));
        }

        checked_total(cmd.lines.iter().map(|l| l.quantity))?;

        let mut working = order.clone();
        for (line, l) in cmd.lines.iter().enumerate() {
            working
                .register_purchase(l.key(), l.quantity, cmd.occurred_at)
                .map_err(|e| e.at_line(line))?;
        }

        let from = EntityRef::order(cmd.order_id.aggregate_id());
        let to = EntityRef::warehouse(cmd.warehouse_id);
        let postings = cmd
            .lines
            .iter()
            .enumerate()
            .flat_map(|(i, l)| {
                [
                    Posting::new(i, Bucket::Available, l.key(), -l.quantity, from, to),
                    Posting::new(i, Bucket::Billed, l.key(), l.quantity, from, to),
                ]
            })
            .collect();

        let purchase = Self {
            id: cmd.purchase_id,
            organization: cmd.organization,
            warehouse_id: cmd.warehouse_id,
            order_id: cmd.order_id,
            transporter_id: cmd.transporter_id,
            invoice_no: cmd.invoice_no.trim().to_string(),
            invoice_date: cmd.invoice_date,
            lines: cmd.lines,
            created_at: cmd.occurred_at,
        };

        let event = PurchaseEvent::PurchaseRecorded(PurchaseRecorded {
            organization: purchase.organization,
            purchase_id: purchase.id,
            order_id: purchase.order_id,
            warehouse_id: purchase.warehouse_id,
            invoice_no: purchase.invoice_no.clone(),
            invoice_date: purchase.invoice_date,
            total_quantity: purchase.total_quantity(),
            order_status: working.status(),
            occurred_at: purchase.created_at,
        });

        *order = working;
        Ok((purchase, postings, event))
    }

    /// Undo this purchase.
    ///
    /// `remaining` are the other purchases recorded against the same order; the
    /// order's counters and status are rebuilt from them rather than adjusted
    /// incrementally.
    pub fn reverse(
        &self,
        order: &mut Order,
        remaining: &[Purchase],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<(Vec<Posting>, PurchaseEvent)> {
        if order.organization() != self.organization || order.id_typed() != self.order_id {
            return Err(DomainError::invariant(format!(
                "purchase {} does not belong to order {}",
                self.id,
                order.id_typed()
            )));
        }

        let mut working = order.clone();
        working.recompute_from(
            remaining
                .iter()
                .filter(|p| p.id != self.id && p.order_id == self.order_id)
                .flat_map(|p| p.lines.iter().map(|l| (l.key(), l.quantity))),
            occurred_at,
        )?;

        let from = EntityRef::warehouse(self.warehouse_id);
        let to = EntityRef::order(self.order_id.aggregate_id());
        let postings = self
            .lines
            .iter()
            .enumerate()
            .flat_map(|(i, l)| {
                [
                    Posting::new(i, Bucket::Billed, l.key(), -l.quantity, from, to),
                    Posting::new(i, Bucket::Available, l.key(), l.quantity, from, to),
                ]
            })
            .collect();

        let event = PurchaseEvent::PurchaseReversed(PurchaseReversed {
            organization: self.organization,
            purchase_id: self.id,
            order_id: self.order_id,
            warehouse_id: self.warehouse_id,
            total_quantity: self.total_quantity(),
            order_status: working.status(),
            occurred_at,
        });

        *order = working;
        Ok((postings, event))
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn transporter_id(&self) -> Option<TransporterId> {
        self.transporter_id
    }

    pub fn invoice_no(&self) -> &str {
        &self.invoice_no
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn total_quantity(&self) -> i64 {
        saturating_total(self.lines.iter().map(|l| l.quantity))
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> PurchaseId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        0
    }
}
