//! Aggregate roots and optimistic concurrency.

use crate::error::{DomainError, DomainResult};
use crate::id::OrganizationId;

/// A consistency boundary owned by exactly one organization.
///
/// Warehouses are the only aggregates whose mutation is serialized; orders,
/// bookings and the other transaction documents are written in the same
/// commit as the warehouse they affect.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the aggregate identifier.
    fn id(&self) -> Self::Id;

    /// Owning organization.
    fn organization(&self) -> OrganizationId;

    /// Monotonically increasing version, bumped once per committed change.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (first write of a fresh aggregate, admin repair).
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Ensure the aggregate belongs to `organization`.
///
/// Cross-organization access is reported as "not found" so callers cannot
/// probe for the existence of another organization's documents.
pub fn ensure_same_organization<A: AggregateRoot>(
    aggregate: &A,
    organization: OrganizationId,
    entity: &'static str,
) -> DomainResult<()> {
    if aggregate.organization() == organization {
        Ok(())
    } else {
        Err(DomainError::not_found(entity, aggregate.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::id::AggregateId;

    struct Bin {
        id: AggregateId,
        organization: OrganizationId,
        version: u64,
    }

    impl AggregateRoot for Bin {
        type Id = AggregateId;

        fn id(&self) -> AggregateId {
            self.id
        }

        fn organization(&self) -> OrganizationId {
            self.organization
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    #[test]
    fn exact_version_mismatch_is_a_concurrency_error() {
        let err = ExpectedVersion::Exact(3).check(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        assert!(ExpectedVersion::Any.check(4).is_ok());
        assert!(ExpectedVersion::Exact(4).check(4).is_ok());
    }

    #[test]
    fn foreign_organization_looks_like_not_found() {
        let bin = Bin {
            id: AggregateId::new(),
            organization: OrganizationId::new(),
            version: 1,
        };
        assert!(ensure_same_organization(&bin, bin.organization, "warehouse").is_ok());
        let err = ensure_same_organization(&bin, OrganizationId::new(), "warehouse").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
