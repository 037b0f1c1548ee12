use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tradeflow_core::{AggregateId, OrganizationId};

use crate::Event;

/// Envelope for a committed ledger event.
///
/// - `organization_id` scopes the event; subscribers never see another
///   organization's traffic unless they ask for it.
/// - `aggregate_id` is the warehouse whose buckets the transaction touched.
/// - `sequence_number` is the warehouse version produced by the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    organization_id: OrganizationId,

    aggregate_id: AggregateId,
    aggregate_type: String,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        organization_id: OrganizationId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            organization_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a warehouse-scoped event with a fresh time-ordered id.
    pub fn for_warehouse(
        organization_id: OrganizationId,
        warehouse: AggregateId,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self::new(
            Uuid::now_v7(),
            organization_id,
            warehouse,
            "warehouse",
            sequence_number,
            payload,
        )
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}
