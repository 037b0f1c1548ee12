//! Quantity arithmetic shared by the transaction documents.

use crate::error::{DomainError, DomainResult};

/// Sum per-line quantities without overflowing.
///
/// Fails with a validation error annotated with the first line whose quantity
/// no longer fits in the running total.
pub fn checked_total<I>(quantities: I) -> DomainResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    quantities
        .into_iter()
        .enumerate()
        .try_fold(0i64, |total, (line, quantity)| {
            total.checked_add(quantity).ok_or_else(|| {
                DomainError::validation(format!("quantity {quantity} overflows the document total"))
                    .at_line(line)
            })
        })
}

/// Sum quantities of an already-validated document, clamping at `i64::MAX`.
pub fn saturating_total<I>(quantities: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    quantities.into_iter().fold(0, i64::saturating_add)
}
