use chrono::{DateTime, Utc};

/// A ledger event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - emitted only for committed transactions
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "bookings.discount_approved").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the transaction took effect (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
