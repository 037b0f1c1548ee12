use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_catalog::{BuyerId, ItemId, Pickup, TransporterId};
use tradeflow_core::{
    AggregateRoot, DomainError, DomainResult, OrganizationId, aggregate_id, saturating_total,
};
use tradeflow_events::Event;
use tradeflow_ledger::{Bucket, BucketKey, EntityRef, Posting, WarehouseId};

use crate::sale::{Sale, SaleId};

aggregate_id!(
    /// A credit note.
    CreditNoteId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditNoteStatus {
    Issued,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteLine {
    pub item: ItemId,
    pub pickup: Pickup,
    /// Over-billed quantity being credited.
    pub quantity: i64,
    pub reason: String,
    pub status: CreditNoteStatus,
}

impl CreditNoteLine {
    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.item, self.pickup)
    }
}

/// Aggregate root: CreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    id: CreditNoteId,
    organization: OrganizationId,
    number: String,
    sale_id: SaleId,
    warehouse_id: WarehouseId,
    buyer_id: BuyerId,
    transporter_id: Option<TransporterId>,
    invoice_date: Option<NaiveDate>,
    lines: Vec<CreditNoteLine>,
    status: CreditNoteStatus,
    version: u64,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

/// What the buyer is now confirmed to owe for one (item, pickup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteLineRequest {
    pub item: ItemId,
    pub pickup: Pickup,
    pub confirmed_quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Command: IssueCreditNote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCreditNote {
    pub organization: OrganizationId,
    pub credit_note_id: CreditNoteId,
    pub sale_id: SaleId,
    pub transporter_id: Option<TransporterId>,
    pub invoice_date: Option<NaiveDate>,
    pub lines: Vec<CreditNoteLineRequest>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteIssued {
    pub organization: OrganizationId,
    pub credit_note_id: CreditNoteId,
    pub number: String,
    pub sale_id: SaleId,
    pub warehouse_id: WarehouseId,
    pub total_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditNoteSettled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNoteSettled {
    pub organization: OrganizationId,
    pub credit_note_id: CreditNoteId,
    pub number: String,
    pub warehouse_id: WarehouseId,
    pub total_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditNoteEvent {
    CreditNoteIssued(CreditNoteIssued),
    CreditNoteSettled(CreditNoteSettled),
}

impl Event for CreditNoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CreditNoteEvent::CreditNoteIssued(_) => "credit_notes.credit_note.issued",
            CreditNoteEvent::CreditNoteSettled(_) => "credit_notes.credit_note.settled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CreditNoteEvent::CreditNoteIssued(e) => e.occurred_at,
            CreditNoteEvent::CreditNoteSettled(e) => e.occurred_at,
        }
    }
}

impl CreditNote {
    /// Issue a credit note for the quantity billed on `sale` beyond what the
    /// buyer is confirmed to owe.
    ///
    /// Lines that are not over-billed are dropped; every kept line needs a
    /// reason. The returned postings grow billed by the over-billed quantity.
    pub fn issue(
        cmd: IssueCreditNote,
        sale: &Sale,
    ) -> DomainResult<(Self, Vec<Posting>, CreditNoteEvent)> {
        if sale.organization() != cmd.organization || sale.id_typed() != cmd.sale_id {
            return Err(DomainError::not_found("sale", cmd.sale_id));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a credit note needs at least one line"));
        }

        let buyer = EntityRef::buyer(sale.buyer_id());
        let warehouse = EntityRef::warehouse(sale.warehouse_id());
        let mut seen = BTreeSet::new();
        let mut lines = Vec::new();
        let mut postings = Vec::new();

        for (index, req) in cmd.lines.iter().enumerate() {
            let key = BucketKey::new(req.item, req.pickup);
            if req.confirmed_quantity < 0 {
                return Err(
                    DomainError::validation("confirmed quantity cannot be negative").at_line(index),
                );
            }
            if !seen.insert(key) {
                return Err(DomainError::validation(format!(
                    "item {} at {} appears on more than one line",
                    req.item, req.pickup
                ))
                .at_line(index));
            }

            let overbilled = sale.total_quantity_sold(key).saturating_sub(req.confirmed_quantity);
            if overbilled <= 0 {
                continue;
            }
            let reason = req
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    DomainError::validation("a reason is required for every credited line")
                        .at_line(index)
                })?;

            postings.push(Posting::new(index, Bucket::Billed, key, overbilled, buyer, warehouse));
            lines.push(CreditNoteLine {
                item: req.item,
                pickup: req.pickup,
                quantity: overbilled,
                reason: reason.to_string(),
                status: CreditNoteStatus::Issued,
            });
        }

        if lines.is_empty() {
            return Err(DomainError::validation(
                "no line is over-billed; nothing to credit",
            ));
        }

        let note = Self {
            id: cmd.credit_note_id,
            organization: cmd.organization,
            number: credit_note_number(cmd.credit_note_id, cmd.occurred_at),
            sale_id: cmd.sale_id,
            warehouse_id: sale.warehouse_id(),
            buyer_id: sale.buyer_id(),
            transporter_id: cmd.transporter_id,
            invoice_date: cmd.invoice_date,
            lines,
            status: CreditNoteStatus::Issued,
            version: 0,
            created_at: cmd.occurred_at,
            settled_at: None,
        };

        let event = CreditNoteEvent::CreditNoteIssued(CreditNoteIssued {
            organization: note.organization,
            credit_note_id: note.id,
            number: note.number.clone(),
            sale_id: note.sale_id,
            warehouse_id: note.warehouse_id,
            total_quantity: note.total_quantity(),
            occurred_at: note.created_at,
        });
        Ok((note, postings, event))
    }

    /// Settle the note: the credited quantity leaves billed and returns to available.
    pub fn settle(
        &mut self,
        organization: OrganizationId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<(Vec<Posting>, CreditNoteEvent)> {
        if self.organization != organization {
            return Err(DomainError::not_found("credit note", self.id));
        }
        if self.status == CreditNoteStatus::Settled {
            return Err(DomainError::AlreadySettled(self.number.clone()));
        }

        let buyer = EntityRef::buyer(self.buyer_id);
        let warehouse = EntityRef::warehouse(self.warehouse_id);
        let postings = self
            .lines
            .iter()
            .enumerate()
            .flat_map(|(i, l)| {
                [
                    Posting::new(i, Bucket::Billed, l.key(), -l.quantity, buyer, warehouse),
                    Posting::new(i, Bucket::Available, l.key(), l.quantity, buyer, warehouse),
                ]
            })
            .collect();

        self.status = CreditNoteStatus::Settled;
        for line in &mut self.lines {
            line.status = CreditNoteStatus::Settled;
        }
        self.settled_at = Some(occurred_at);
        self.version += 1;

        let event = CreditNoteEvent::CreditNoteSettled(CreditNoteSettled {
            organization,
            credit_note_id: self.id,
            number: self.number.clone(),
            warehouse_id: self.warehouse_id,
            total_quantity: self.total_quantity(),
            occurred_at,
        });
        Ok((postings, event))
    }

    pub fn id_typed(&self) -> CreditNoteId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn sale_id(&self) -> SaleId {
        self.sale_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn buyer_id(&self) -> BuyerId {
        self.buyer_id
    }

    pub fn transporter_id(&self) -> Option<TransporterId> {
        self.transporter_id
    }

    pub fn invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date
    }

    pub fn lines(&self) -> &[CreditNoteLine] {
        &self.lines
    }

    pub fn status(&self) -> CreditNoteStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn total_quantity(&self) -> i64 {
        saturating_total(self.lines.iter().map(|l| l.quantity))
    }
}

impl AggregateRoot for CreditNote {
    type Id = CreditNoteId;

    fn id(&self) -> CreditNoteId {
        self.id
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// `CN-<unix millis>-<12 hex digits>`; the suffix is the random tail of the
/// note id, so notes issued in the same millisecond still differ.
fn credit_note_number(id: CreditNoteId, at: DateTime<Utc>) -> String {
    let id = id.aggregate_id().as_uuid().simple().to_string();
    format!("CN-{}-{}", at.timestamp_millis(), &id[20..])
}
