//! Order transaction: a manufacturer's commitment to bring stock into a warehouse.
//!
//! Placing an order grows the available bucket. Purchases fulfil it line by
//! line; its status is always derived from the per-line purchased quantities.
//! This crate contains deterministic domain logic only (no IO).

pub mod order;

pub use order::{
    Order, OrderDetails, OrderDetailsUpdated, OrderEvent, OrderId, OrderLine, OrderLineRequest,
    OrderPlaced, OrderRemoved, OrderStatus, PlaceOrder, UpdateOrderDetails,
};
