//! The allocation engine.
//!
//! Validates how a payment's net amount is spread over a counterparty's
//! outstanding documents. Nothing here performs I/O or keeps state; the
//! caller persists the outcome through [`MonetaryDocument::apply`].

use super::document::{DocumentId, MonetaryDocument};
use super::money::{self, Amount};
use super::payment::Allocation;
use crate::error::AllocationError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Result of a successful [`allocate`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    /// Applied amounts, in the order the documents were supplied.
    pub applied: Vec<Allocation>,
    pub unused_amount: Decimal,
}

/// Gross amount less deductions, rounded to the minor unit.
pub fn compute_net_amount(
    gross_amount: Decimal,
    deductions: Decimal,
) -> Result<Decimal, AllocationError> {
    if deductions > gross_amount {
        return Err(AllocationError::NegativeNet {
            gross: gross_amount,
            deductions,
        });
    }
    let net = money::checked_sub(gross_amount, deductions)?;
    Ok(money::round_minor(net))
}

/// Validates the caller's requested allocations against `documents` and
/// `net_amount`.
///
/// The engine never distributes on its own: the applied amounts are exactly
/// the requested ones, with zero requests dropped. Each request must be an
/// [`Amount`], so sub-cent requests are refused rather than left as
/// unpayable residue on the document.
pub fn allocate(
    net_amount: Decimal,
    documents: &[MonetaryDocument],
    requested: &HashMap<DocumentId, Decimal>,
) -> Result<AllocationOutcome, AllocationError> {
    if net_amount < Decimal::ZERO {
        return Err(AllocationError::NegativeNet {
            gross: net_amount,
            deductions: Decimal::ZERO,
        });
    }

    // Report unknown targets in a stable order regardless of map iteration.
    let mut unknown: Vec<&DocumentId> = requested
        .keys()
        .filter(|id| !documents.iter().any(|doc| &doc.id == *id))
        .collect();
    unknown.sort();
    if let Some(document) = unknown.first() {
        return Err(AllocationError::UnknownDocument {
            document: (*document).clone(),
        });
    }

    let mut applied = Vec::with_capacity(requested.len());
    let mut total = Amount::ZERO;
    for doc in documents {
        let Some(&amount) = requested.get(&doc.id) else {
            continue;
        };
        // A document listed twice is validated and applied once.
        if applied.iter().any(|a: &Allocation| a.document == doc.id) {
            continue;
        }
        let balance = doc.allocatable_balance();
        if amount < Decimal::ZERO || amount > balance {
            return Err(AllocationError::ExceedsBalance {
                document: doc.id.clone(),
                requested: amount,
                balance,
            });
        }
        let amount = Amount::new(amount)?;
        if !amount.is_zero() {
            total = total.checked_add(amount)?;
            applied.push(Allocation::new(doc.id.clone(), amount.value()));
        }
    }

    let total_requested = total.value();
    if total_requested > net_amount {
        return Err(AllocationError::ExceedsNetAmount {
            requested: total_requested,
            net: net_amount,
        });
    }

    tracing::debug!(
        documents = applied.len(),
        applied = %total_requested,
        net = %net_amount,
        "allocation validated"
    );

    Ok(AllocationOutcome {
        applied,
        unused_amount: net_amount - total_requested,
    })
}
