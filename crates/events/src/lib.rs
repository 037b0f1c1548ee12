//! `tradeflow-events`: event contract and in-process fan-out.
//!
//! Every committed ledger transaction is announced as an [`EventEnvelope`] on an
//! [`EventBus`]. The envelope is published *after* the commit succeeds, so
//! subscribers (notifications, audit sinks) never observe a rolled-back change.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod organization;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use organization::OrganizationScoped;
