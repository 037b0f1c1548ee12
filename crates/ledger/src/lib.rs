//! Warehouse ledger and history recorder.
//!
//! A warehouse owns three buckets (available, committed, billed) keyed by
//! (item, pickup). Transactions never touch buckets directly: they describe
//! their effect as [`Posting`]s, and [`apply_postings`] applies them all or
//! none, emitting one [`HistoryRecord`] per movement.

pub mod bucket;
pub mod history;
pub mod posting;
pub mod warehouse;

pub use bucket::{Bucket, BucketKey};
pub use history::{EntityKind, EntityRef, HistoryQuery, HistoryRecord, HistorySink};
pub use posting::{Posting, apply_postings};
pub use warehouse::{CreateWarehouse, Location, Warehouse, WarehouseId};
