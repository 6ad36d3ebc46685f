/// serializable views of payment results
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::payments::PaymentOutcome;
use crate::records::Installment;
use crate::types::{FeeId, FeeStatus, FeeType, InstallmentId, InstallmentStatus, PaymentMethod, SchoolId, StudentId};

/// what gets printed or sent to the payer after a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub fee_id: FeeId,
    pub fee_type: FeeType,
    pub issued_at: DateTime<Utc>,
    pub payment_method: Option<PaymentMethod>,
    pub check_number: Option<String>,
    pub note: Option<String>,
    pub lines: Vec<ReceiptLine>,
    pub total_applied: Money,
    /// excess that could not be placed on any installment
    pub unapplied: Money,
    pub fee: FeeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub installment_id: InstallmentId,
    pub receipt_number: Option<String>,
    pub due_date: chrono::NaiveDate,
    pub amount: Money,
    pub paid_amount: Money,
    pub balance: Money,
    pub status: InstallmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub net_amount: Money,
    pub paid: Money,
    pub balance: Money,
    pub status: FeeStatus,
}

impl ReceiptLine {
    fn from_installment(installment: &Installment) -> Self {
        ReceiptLine {
            installment_id: installment.id,
            receipt_number: installment.receipt_number.clone(),
            due_date: installment.due_date,
            amount: installment.amount,
            paid_amount: installment.paid_amount,
            balance: installment.balance,
            status: installment.status,
        }
    }
}

impl PaymentReceipt {
    pub fn from_outcome(outcome: &PaymentOutcome, issued_at: DateTime<Utc>) -> Self {
        let fee = &outcome.updated_fee;
        // metadata is stamped on every installment that took money
        let stamped = outcome
            .updated_installments
            .iter()
            .find(|i| i.paid_at.is_some());

        PaymentReceipt {
            school_id: fee.school_id,
            student_id: fee.student_id,
            fee_id: fee.id,
            fee_type: fee.fee_type.clone(),
            issued_at,
            payment_method: stamped.and_then(|i| i.payment_method.clone()),
            check_number: stamped.and_then(|i| i.check_number.clone()),
            note: stamped.and_then(|i| i.payment_note.clone()),
            lines: outcome
                .updated_installments
                .iter()
                .map(ReceiptLine::from_installment)
                .collect(),
            total_applied: outcome.applied,
            unapplied: outcome.unapplied,
            fee: FeeSummary {
                net_amount: fee.net_amount(),
                paid: fee.paid,
                balance: fee.balance,
                status: fee.status,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Fee;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use uuid::Uuid;

    fn outcome() -> PaymentOutcome {
        let mut fee = Fee::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            FeeType::Transportation,
            Money::from_decimal(dec!(250.50)),
            Money::from_decimal(dec!(0.50)),
        );
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut inst = Installment::new(fee.id, Money::from_decimal(dec!(125)), due);
        inst.absorb(Money::from_decimal(dec!(125)));
        inst.receipt_number = Some("INV-7".to_string());
        inst.payment_method = Some(PaymentMethod::Transfer);
        inst.paid_at = Some(Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap());
        fee.reconcile_with(&[inst.clone()]);

        PaymentOutcome {
            updated_installments: vec![inst],
            updated_fee: fee,
            receipt_numbers: vec!["INV-7".to_string()],
            applied: Money::from_decimal(dec!(125)),
            unapplied: Money::ZERO,
            receipts_persisted: true,
            events: Vec::new(),
        }
    }

    #[test]
    fn test_receipt_from_outcome() {
        let outcome = outcome();
        let issued = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();

        let receipt = PaymentReceipt::from_outcome(&outcome, issued);

        assert_eq!(receipt.lines.len(), 1);
        assert_eq!(receipt.lines[0].receipt_number.as_deref(), Some("INV-7"));
        assert_eq!(receipt.payment_method, Some(PaymentMethod::Transfer));
        assert_eq!(receipt.fee.net_amount, Money::from_decimal(dec!(250)));
        assert_eq!(receipt.fee.balance, Money::from_decimal(dec!(125)));
        assert_eq!(receipt.fee.status, FeeStatus::Partial);
    }

    #[test]
    fn test_receipt_json_shape() {
        let receipt = PaymentReceipt::from_outcome(&outcome(), Utc::now());

        let value: Value = serde_json::from_str(&receipt.to_json().unwrap()).unwrap();

        assert_eq!(value["lines"][0]["receiptNumber"], "INV-7");
        assert_eq!(value["totalApplied"], serde_json::to_value(receipt.total_applied).unwrap());
        assert_eq!(value["fee"]["status"], serde_json::to_value(FeeStatus::Partial).unwrap());

        let back: PaymentReceipt = serde_json::from_str(&receipt.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, receipt);
    }
}
