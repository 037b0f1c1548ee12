//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a [`DomainError`].
///
/// The surrounding layers map on this rather than on individual variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, missing field, invalid reference id.
    Validation,
    /// Warehouse, order, item or bucket entry absent.
    NotFound,
    /// A bucket would go negative.
    InsufficientQuantity,
    /// The target is in a state that forbids the operation.
    StateConflict,
    /// Stale version / lost race with a concurrent writer.
    Concurrency,
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist (or is not visible to the organization).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Applying a delta would drive a bucket negative.
    #[error(
        "insufficient {bucket} quantity for item {item} at {pickup}: available {available}, requested {requested}"
    )]
    InsufficientQuantity {
        bucket: &'static str,
        item: String,
        pickup: String,
        available: i64,
        requested: i64,
    },

    /// A purchase line would exceed the ordered quantity.
    #[error(
        "item {item} at {pickup} is being purchased beyond the order: ordered {ordered}, already purchased {purchased}, requested {requested}"
    )]
    OverPurchase {
        item: String,
        pickup: String,
        ordered: i64,
        purchased: i64,
        requested: i64,
    },

    #[error("order {0} is already fully billed")]
    OrderAlreadyBilled(String),

    #[error("booking {0} has already been approved either completely or partially")]
    AlreadyApproved(String),

    #[error("credit note {0} is already settled")]
    AlreadySettled(String),

    /// Any other lifecycle rule that forbids the operation.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The wrapped error was raised while processing transaction line `line` (0-based).
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<DomainError>,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Attach a line index. Already-annotated errors keep their innermost index.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            annotated @ Self::AtLine { .. } => annotated,
            other => Self::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The line the error was raised on, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The error without its line annotation.
    pub fn root(&self) -> &DomainError {
        match self {
            Self::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AtLine { source, .. } => source.kind(),
            Self::Validation(_) | Self::InvalidId(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientQuantity { .. } => ErrorKind::InsufficientQuantity,
            Self::OverPurchase { .. }
            | Self::OrderAlreadyBilled(_)
            | Self::AlreadyApproved(_)
            | Self::AlreadySettled(_)
            | Self::StateConflict(_)
            | Self::InvariantViolation(_) => ErrorKind::StateConflict,
            Self::Conflict(_) => ErrorKind::Concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_annotation_keeps_innermost_index() {
        let err = DomainError::validation("quantity must be positive")
            .at_line(2)
            .at_line(7);
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn over_purchase_is_a_state_conflict() {
        let err = DomainError::OverPurchase {
            item: "x".into(),
            pickup: "rack".into(),
            ordered: 100,
            purchased: 100,
            requested: 1,
        };
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(err.root(), &err);
    }
}
