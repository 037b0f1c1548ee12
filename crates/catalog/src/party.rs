//! References to counterparties owned by master-data management.
//!
//! The ledger only ever stores these ids; it never loads the records behind them.

use tradeflow_core::aggregate_id;

aggregate_id!(
    /// A buyer (destination of booked stock).
    BuyerId
);

aggregate_id!(
    /// A manufacturer (source of ordered stock).
    ManufacturerId
);

aggregate_id!(
    /// A transport company carrying a purchase or credit note.
    TransporterId
);
