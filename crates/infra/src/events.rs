//! Integration events published after a ledger commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_bookings::BookingEvent;
use tradeflow_credit_notes::CreditNoteEvent;
use tradeflow_events::{Event, EventEnvelope};
use tradeflow_orders::OrderEvent;
use tradeflow_purchases::PurchaseEvent;

/// Every event a ledger transaction can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Order(OrderEvent),
    Booking(BookingEvent),
    Purchase(PurchaseEvent),
    CreditNote(CreditNoteEvent),
}

/// What travels on the bus.
pub type LedgerEnvelope = EventEnvelope<LedgerEvent>;

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Order(e) => e.event_type(),
            LedgerEvent::Booking(e) => e.event_type(),
            LedgerEvent::Purchase(e) => e.event_type(),
            LedgerEvent::CreditNote(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            LedgerEvent::Order(e) => e.version(),
            LedgerEvent::Booking(e) => e.version(),
            LedgerEvent::Purchase(e) => e.version(),
            LedgerEvent::CreditNote(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Order(e) => e.occurred_at(),
            LedgerEvent::Booking(e) => e.occurred_at(),
            LedgerEvent::Purchase(e) => e.occurred_at(),
            LedgerEvent::CreditNote(e) => e.occurred_at(),
        }
    }
}

impl From<OrderEvent> for LedgerEvent {
    fn from(e: OrderEvent) -> Self {
        LedgerEvent::Order(e)
    }
}

impl From<BookingEvent> for LedgerEvent {
    fn from(e: BookingEvent) -> Self {
        LedgerEvent::Booking(e)
    }
}

impl From<PurchaseEvent> for LedgerEvent {
    fn from(e: PurchaseEvent) -> Self {
        LedgerEvent::Purchase(e)
    }
}

impl From<CreditNoteEvent> for LedgerEvent {
    fn from(e: CreditNoteEvent) -> Self {
        LedgerEvent::CreditNote(e)
    }
}
