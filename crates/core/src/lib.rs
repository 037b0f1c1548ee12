//! `tradeflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the aggregate/concurrency contract and the error model shared by
//! every ledger crate.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod quantity;

pub use aggregate::{AggregateRoot, ExpectedVersion, ensure_same_organization};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, OrganizationId};
pub use quantity::{checked_total, saturating_total};
