// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::StoreError;

/// Failures raised by ledger operations. Validation variants are returned
/// before anything is mutated; `Persistence` is returned after the in-memory
/// change has already been applied.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid quantity {requested} (available {available})")]
    InvalidQuantity {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid price {0}")]
    InvalidPrice(Decimal),

    #[error("Insufficient quantity of '{name}': requested {requested}, available {available}")]
    InsufficientQuantity {
        name: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Sell of '{name}' could not allocate {remaining} across open lots")]
    ExecutionIncomplete { name: String, remaining: Decimal },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Transaction '{0}' is already reverted")]
    AlreadyReverted(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl LedgerError {
    pub fn stock(id: &str) -> Self {
        LedgerError::NotFound {
            kind: "Stock",
            id: id.to_string(),
        }
    }

    pub fn loan(id: &str) -> Self {
        LedgerError::NotFound {
            kind: "Loan",
            id: id.to_string(),
        }
    }

    pub fn emi(loan_id: &str, month: u32) -> Self {
        LedgerError::NotFound {
            kind: "EMI payment",
            id: format!("{}#{}", loan_id, month),
        }
    }

    pub fn transaction(id: &str) -> Self {
        LedgerError::NotFound {
            kind: "Transaction",
            id: id.to_string(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_quantity_reports_requested_and_available() {
        let err = LedgerError::InsufficientQuantity {
            name: "Ather Energy".into(),
            requested: Decimal::from(40),
            available: Decimal::from(30),
        };
        let msg = err.to_string();
        assert!(msg.contains("Ather Energy"));
        assert!(msg.contains("requested 40"));
        assert!(msg.contains("available 30"));
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(
            LedgerError::emi("loan-1", 4).to_string(),
            "EMI payment 'loan-1#4' not found"
        );
    }
}
