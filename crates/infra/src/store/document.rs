use core::fmt;
use core::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;

use tradeflow_bookings::Booking;
use tradeflow_catalog::Item;
use tradeflow_core::{AggregateId, AggregateRoot, OrganizationId};
use tradeflow_credit_notes::{CreditNote, Sale};
use tradeflow_ledger::Warehouse;
use tradeflow_orders::Order;
use tradeflow_purchases::Purchase;

use super::{StoreError, StoreResult, StoredDocument};

/// Collections of the document store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Items,
    Warehouses,
    Orders,
    Bookings,
    Purchases,
    Sales,
    CreditNotes,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Items,
        Collection::Warehouses,
        Collection::Orders,
        Collection::Bookings,
        Collection::Purchases,
        Collection::Sales,
        Collection::CreditNotes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Items => "items",
            Collection::Warehouses => "warehouses",
            Collection::Orders => "orders",
            Collection::Bookings => "bookings",
            Collection::Purchases => "purchases",
            Collection::Sales => "sales",
            Collection::CreditNotes => "credit_notes",
        }
    }

    /// Singular noun used in "not found" errors.
    pub fn entity(self) -> &'static str {
        match self {
            Collection::Items => "item",
            Collection::Warehouses => "warehouse",
            Collection::Orders => "order",
            Collection::Bookings => "booking",
            Collection::Purchases => "purchase",
            Collection::Sales => "sale",
            Collection::CreditNotes => "credit note",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::Serialization(format!("unknown collection '{s}'")))
    }
}

/// A type stored in one [`Collection`].
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn document_id(&self) -> AggregateId;

    fn organization(&self) -> OrganizationId;
}

/// A decoded document together with the revision it was loaded at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<D> {
    pub document: D,
    pub revision: u64,
}

impl<D: Document> Versioned<D> {
    pub fn decode(stored: StoredDocument) -> StoreResult<Self> {
        if stored.collection != D::COLLECTION {
            return Err(StoreError::Serialization(format!(
                "expected a {} document, found {}",
                D::COLLECTION,
                stored.collection
            )));
        }
        let document = serde_json::from_value(stored.body).map_err(|e| {
            StoreError::Serialization(format!("{} {}: {e}", stored.collection, stored.id))
        })?;
        Ok(Self {
            document,
            revision: stored.revision,
        })
    }
}

impl Document for Item {
    const COLLECTION: Collection = Collection::Items;

    fn document_id(&self) -> AggregateId {
        self.id.aggregate_id()
    }

    fn organization(&self) -> OrganizationId {
        self.organization
    }
}

macro_rules! aggregate_document {
    ($ty:ty, $collection:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = $collection;

            fn document_id(&self) -> AggregateId {
                AggregateRoot::id(self).aggregate_id()
            }

            fn organization(&self) -> OrganizationId {
                AggregateRoot::organization(self)
            }
        }
    };
}

aggregate_document!(Warehouse, Collection::Warehouses);
aggregate_document!(Order, Collection::Orders);
aggregate_document!(Booking, Collection::Bookings);
aggregate_document!(Purchase, Collection::Purchases);
aggregate_document!(Sale, Collection::Sales);
aggregate_document!(CreditNote, Collection::CreditNotes);
