use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_catalog::{BuyerId, ItemCatalog, ItemId, Pickup};
use tradeflow_core::{
    AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id, checked_total,
    saturating_total,
};
use tradeflow_ledger::{BucketKey, WarehouseId};

aggregate_id!(
    /// An aggregated sale to one buyer.
    SaleId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub item: ItemId,
    pub pickup: Pickup,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleInvoice {
    pub invoice_no: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<SaleLine>,
}

/// Reference document for credit notes. Registering a sale has no ledger effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    organization: OrganizationId,
    warehouse_id: WarehouseId,
    buyer_id: BuyerId,
    invoices: Vec<SaleInvoice>,
    created_at: DateTime<Utc>,
}

/// Command: RegisterSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSale {
    pub organization: OrganizationId,
    pub sale_id: SaleId,
    pub warehouse_id: WarehouseId,
    pub buyer_id: BuyerId,
    pub invoices: Vec<SaleInvoice>,
    pub occurred_at: DateTime<Utc>,
}

impl Sale {
    pub fn register<C>(cmd: RegisterSale, catalog: &C) -> DomainResult<Self>
    where
        C: ItemCatalog + ?Sized,
    {
        if cmd.invoices.is_empty() {
            return Err(DomainError::validation("a sale needs at least one invoice"));
        }
        let mut line = 0;
        for invoice in &cmd.invoices {
            if invoice.invoice_no.trim().is_empty() {
                return Err(DomainError::validation("invoice number cannot be empty"));
            }
            if invoice.lines.is_empty() {
                return Err(DomainError::validation(format!(
                    "invoice {} has no lines",
                    invoice.invoice_no
                )));
            }
            for l in &invoice.lines {
                if l.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive").at_line(line));
                }
                catalog
                    .get_item(cmd.organization, l.item)
                    .map_err(|e| e.at_line(line))?;
                line += 1;
            }
        }
        checked_total(
            cmd.invoices
                .iter()
                .flat_map(|i| &i.lines)
                .map(|l| l.quantity),
        )?;

        Ok(Self {
            id: cmd.sale_id,
            organization: cmd.organization,
            warehouse_id: cmd.warehouse_id,
            buyer_id: cmd.buyer_id,
            invoices: cmd.invoices,
            created_at: cmd.occurred_at,
        })
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn buyer_id(&self) -> BuyerId {
        self.buyer_id
    }

    pub fn invoices(&self) -> &[SaleInvoice] {
        &self.invoices
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Sum of the quantity sold for `key` across every invoice.
    pub fn total_quantity_sold(&self, key: BucketKey) -> i64 {
        saturating_total(
            self.invoices
                .iter()
                .flat_map(|i| &i.lines)
                .filter(|l| l.item == key.item && l.pickup == key.pickup)
                .map(|l| l.quantity),
        )
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> SaleId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        0
    }
}
