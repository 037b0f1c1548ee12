//! Item catalog (reference data) and the pickup dimension of the ledger.
//!
//! Items are immutable reference data: transactions look them up by id and
//! never mutate them. This crate contains no IO.

pub mod item;
pub mod party;
pub mod pickup;

pub use item::{CreateItem, InMemoryItemCatalog, Item, ItemCatalog, ItemId, Packaging, require_items};
pub use party::{BuyerId, ManufacturerId, TransporterId};
pub use pickup::Pickup;
