pub mod allocation;
pub mod engine;

use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::records::{Fee, Installment};
use crate::types::PaymentMethod;

pub use allocation::{allocate, allocate_across, cascade_order, Allocation, AllocationPlan};
pub use engine::PaymentAllocationEngine;

/// metadata recorded on every installment a payment touches
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentMeta {
    pub payment_method: Option<PaymentMethod>,
    pub payment_note: Option<String>,
    pub check_number: Option<String>,
}

impl PaymentMeta {
    pub fn cash() -> Self {
        Self {
            payment_method: Some(PaymentMethod::Cash),
            ..Self::default()
        }
    }

    pub fn check(number: impl Into<String>) -> Self {
        Self {
            payment_method: Some(PaymentMethod::Check),
            check_number: Some(number.into()),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.payment_note = Some(note.into());
        self
    }

    fn stamp(&self, installment: &mut Installment) {
        if self.payment_method.is_some() {
            installment.payment_method = self.payment_method.clone();
        }
        if self.payment_note.is_some() {
            installment.payment_note = self.payment_note.clone();
        }
        if self.check_number.is_some() {
            installment.check_number = self.check_number.clone();
        }
    }
}

/// result of applying one payment
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    /// every installment the payment touched, in application order
    pub updated_installments: Vec<Installment>,
    pub updated_fee: Fee,
    /// numbers newly assigned by this payment, in application order
    pub receipt_numbers: Vec<String>,
    pub applied: Money,
    /// excess beyond what the fee's open installments could take; not stored
    pub unapplied: Money,
    /// false when the receipt counter could not be advanced and the numbers
    /// were generated without a reservation
    pub receipts_persisted: bool,
    pub events: Vec<Event>,
}

/// reject zero and negative payments
pub fn validate_amount(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::from_major(1)).is_ok());
        assert!(validate_amount(Money::CENT).is_ok());
        assert_eq!(
            validate_amount(Money::ZERO),
            Err(LedgerError::InvalidAmount { amount: Money::ZERO })
        );
        assert!(validate_amount(Money::from_major(-10)).is_err());
    }

    #[test]
    fn test_meta_stamp_keeps_existing_values() {
        let mut inst = Installment::new(
            uuid::Uuid::new_v4(),
            Money::from_major(100),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        PaymentMeta::check("000123").with_note("first half").stamp(&mut inst);
        PaymentMeta::default().stamp(&mut inst);

        assert_eq!(inst.payment_method, Some(PaymentMethod::Check));
        assert_eq!(inst.check_number.as_deref(), Some("000123"));
        assert_eq!(inst.payment_note.as_deref(), Some("first half"));
    }
}
