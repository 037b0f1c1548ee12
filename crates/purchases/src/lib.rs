//! Purchase transaction: physical receipt billed against an order.
//!
//! Recording a purchase moves stock from available to billed and advances the
//! order's per-line purchased counters. Deleting one reverses the movement and
//! recomputes the order from the purchases that remain.

pub mod purchase;

pub use purchase::{
    Purchase, PurchaseEvent, PurchaseId, PurchaseLine, PurchaseRecorded, PurchaseReversed,
    RecordPurchase,
};
