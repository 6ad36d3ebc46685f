use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{
    FeeId, FeeStatus, FeeType, InstallmentId, InstallmentStatus, PaymentMethod, SchoolId,
    StudentId,
};

/// one scheduled slice of a fee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub fee_id: FeeId,

    // amounts
    pub amount: Money,
    pub paid_amount: Money,
    pub balance: Money,

    pub due_date: NaiveDate,
    pub status: InstallmentStatus,

    // receipt
    pub receipt_number: Option<String>,

    // payment metadata, stored as given
    pub payment_method: Option<PaymentMethod>,
    pub payment_note: Option<String>,
    pub check_number: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,

    /// bumped by the store on every write; a save carrying an older value
    /// is rejected
    #[serde(default)]
    pub version: u64,
}

impl Installment {
    /// create an unpaid installment
    pub fn new(fee_id: FeeId, amount: Money, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            fee_id,
            amount,
            paid_amount: Money::ZERO,
            balance: amount,
            due_date,
            status: InstallmentStatus::Unpaid,
            receipt_number: None,
            payment_method: None,
            payment_note: None,
            check_number: None,
            paid_at: None,
            version: 0,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// take as much of `available` as this installment can hold and return
    /// the amount taken. Receipt numbers are handled by the caller.
    pub fn absorb(&mut self, available: Money) -> Money {
        let previously_paid = self.paid_amount;
        let to_apply = available.min(self.amount.saturating_sub(previously_paid));
        let new_paid = previously_paid + to_apply;

        if new_paid >= self.amount {
            self.paid_amount = self.amount;
            self.balance = Money::ZERO;
            self.status = InstallmentStatus::Paid;
        } else {
            self.paid_amount = new_paid;
            self.balance = self.amount - new_paid;
            self.status = InstallmentStatus::Partial;
        }

        to_apply
    }

    /// paid or partial but still without a receipt number
    pub fn needs_receipt(&self) -> bool {
        self.status.has_receipt() && self.receipt_number.is_none()
    }

    /// set the receipt number unless one is already present; returns whether
    /// the number was taken
    pub fn assign_receipt(&mut self, number: String) -> bool {
        if self.receipt_number.is_some() {
            return false;
        }
        self.receipt_number = Some(number);
        true
    }

    /// recompute unpaid/upcoming/overdue from the due date. Installments with
    /// any payment are left alone. Returns whether the status changed.
    pub fn refresh_schedule_status(&mut self, today: NaiveDate, upcoming_window_days: u32) -> bool {
        if self.status.has_receipt() || self.paid_amount.is_positive() {
            return false;
        }

        let next = if self.due_date < today {
            InstallmentStatus::Overdue
        } else if self.due_date <= today + Duration::days(upcoming_window_days as i64) {
            InstallmentStatus::Upcoming
        } else {
            InstallmentStatus::Unpaid
        };

        let changed = next != self.status;
        self.status = next;
        changed
    }

    pub fn check_invariants(&self) -> Result<()> {
        if self.paid_amount + self.balance != self.amount {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "installment {}: paid {} + balance {} != amount {}",
                    self.id, self.paid_amount, self.balance, self.amount
                ),
            });
        }
        if self.paid_amount > self.amount {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "installment {}: paid {} exceeds amount {}",
                    self.id, self.paid_amount, self.amount
                ),
            });
        }
        if self.status.has_receipt() != self.receipt_number.is_some() {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "installment {}: status {:?} with receipt {:?}",
                    self.id, self.status, self.receipt_number
                ),
            });
        }
        Ok(())
    }
}

/// a student's fee, the aggregate over its installments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: FeeId,
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub fee_type: FeeType,

    pub amount: Money,
    pub discount: Money,

    // derived by reconciliation
    pub paid: Money,
    pub balance: Money,
    pub status: FeeStatus,

    #[serde(default)]
    pub version: u64,
}

impl Fee {
    pub fn new(
        school_id: SchoolId,
        student_id: StudentId,
        fee_type: FeeType,
        amount: Money,
        discount: Money,
    ) -> Self {
        let balance = amount.saturating_sub(discount);
        Self {
            id: Uuid::new_v4(),
            school_id,
            student_id,
            fee_type,
            amount,
            discount,
            paid: Money::ZERO,
            balance,
            status: if balance.is_zero() { FeeStatus::Paid } else { FeeStatus::Unpaid },
            version: 0,
        }
    }

    /// amount due after discount
    pub fn net_amount(&self) -> Money {
        self.amount - self.discount
    }

    pub fn check_invariants(&self) -> Result<()> {
        let expected_balance = self.net_amount().saturating_sub(self.paid);
        if self.balance != expected_balance {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "fee {}: balance {} != expected {}",
                    self.id, self.balance, expected_balance
                ),
            });
        }

        let expected_status = if self.balance.is_zero() {
            FeeStatus::Paid
        } else if self.paid.is_positive() {
            FeeStatus::Partial
        } else {
            FeeStatus::Unpaid
        };
        if self.status != expected_status {
            return Err(LedgerError::InvariantViolation {
                message: format!(
                    "fee {}: status {:?} inconsistent with balance {} and paid {}",
                    self.id, self.status, self.balance, self.paid
                ),
            });
        }
        Ok(())
    }
}
