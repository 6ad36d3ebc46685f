use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::records::{Fee, Installment};
use crate::types::{FeeStatus, InstallmentStatus};

/// recomputed fee aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTotals {
    pub paid: Money,
    pub balance: Money,
    pub status: FeeStatus,
}

/// what one installment contributes to its fee's paid total.
///
/// A paid installment with no recorded amount counts in full.
pub fn effective_paid(installment: &Installment) -> Money {
    match installment.status {
        InstallmentStatus::Paid if !installment.paid_amount.is_positive() => installment.amount,
        InstallmentStatus::Paid | InstallmentStatus::Partial => installment.paid_amount,
        _ => Money::ZERO,
    }
}

/// recompute paid/balance/status of `fee` from its installments.
///
/// Pure and idempotent: only `amount` and `discount` are read from the fee,
/// never the previously derived fields.
pub fn reconcile(fee: &Fee, installments: &[Installment]) -> FeeTotals {
    let paid: Money = installments
        .iter()
        .filter(|i| i.fee_id == fee.id)
        .map(effective_paid)
        .sum();

    let total = fee.net_amount();
    let balance = total.saturating_sub(paid.min(total));

    let status = if !balance.is_positive() {
        FeeStatus::Paid
    } else if paid.is_positive() {
        FeeStatus::Partial
    } else {
        FeeStatus::Unpaid
    };

    FeeTotals {
        paid,
        balance,
        status,
    }
}

impl Fee {
    /// write reconciled totals back onto the fee
    pub fn apply_totals(&mut self, totals: FeeTotals) {
        self.paid = totals.paid;
        self.balance = totals.balance;
        self.status = totals.status;
    }

    /// reconcile and apply in one step; returns whether anything changed
    pub fn reconcile_with(&mut self, installments: &[Installment]) -> bool {
        let totals = reconcile(self, installments);
        let changed = self.paid != totals.paid
            || self.balance != totals.balance
            || self.status != totals.status;
        self.apply_totals(totals);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use uuid::Uuid;

    use crate::types::FeeType;

    fn fee(amount: i64, discount: i64) -> Fee {
        Fee::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            FeeType::Tuition,
            Money::from_major(amount),
            Money::from_major(discount),
        )
    }

    fn installment(fee: &Fee, amount: i64, paid: i64) -> Installment {
        let mut inst = Installment::new(
            fee.id,
            Money::from_major(amount),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        if paid > 0 {
            inst.absorb(Money::from_major(paid));
            inst.receipt_number = Some("1".to_string());
        }
        inst
    }

    #[test]
    fn test_unpaid_fee() {
        let fee = fee(600, 0);
        let insts = vec![installment(&fee, 300, 0), installment(&fee, 300, 0)];

        let totals = reconcile(&fee, &insts);

        assert_eq!(totals.paid, Money::ZERO);
        assert_eq!(totals.balance, Money::from_major(600));
        assert_eq!(totals.status, FeeStatus::Unpaid);
    }

    #[test]
    fn test_partial_fee_with_discount() {
        let fee = fee(600, 100);
        let insts = vec![installment(&fee, 250, 250), installment(&fee, 250, 50)];

        let totals = reconcile(&fee, &insts);

        assert_eq!(totals.paid, Money::from_major(300));
        assert_eq!(totals.balance, Money::from_major(200));
        assert_eq!(totals.status, FeeStatus::Partial);
    }

    #[test]
    fn test_paid_fee_clamps_balance() {
        // installments sum above the discounted total
        let fee = fee(600, 100);
        let insts = vec![installment(&fee, 300, 300), installment(&fee, 300, 300)];

        let totals = reconcile(&fee, &insts);

        assert_eq!(totals.paid, Money::from_major(600));
        assert_eq!(totals.balance, Money::ZERO);
        assert_eq!(totals.status, FeeStatus::Paid);
    }

    #[test]
    fn test_paid_status_without_amount_counts_in_full() {
        let fee = fee(200, 0);
        let mut legacy = installment(&fee, 200, 0);
        legacy.status = InstallmentStatus::Paid;

        assert_eq!(effective_paid(&legacy), Money::from_major(200));
        assert_eq!(reconcile(&fee, &[legacy]).status, FeeStatus::Paid);
    }

    #[test]
    fn test_overdue_installment_contributes_nothing() {
        let fee = fee(100, 0);
        let mut inst = installment(&fee, 100, 0);
        inst.status = InstallmentStatus::Overdue;
        inst.paid_amount = Money::from_major(40);

        assert_eq!(effective_paid(&inst), Money::ZERO);
    }

    #[test]
    fn test_other_fee_installments_ignored() {
        let fee_a = fee(100, 0);
        let fee_b = fee(100, 0);
        let insts = vec![installment(&fee_b, 100, 100)];

        assert_eq!(reconcile(&fee_a, &insts).paid, Money::ZERO);
    }

    #[test]
    fn test_reconcile_with_reports_change() {
        let mut fee = fee(300, 0);
        let insts = vec![installment(&fee, 300, 120)];

        assert!(fee.reconcile_with(&insts));
        assert!(!fee.reconcile_with(&insts));
        assert!(fee.check_invariants().is_ok());
    }

    proptest! {
        #[test]
        fn prop_reconcile_idempotent_and_consistent(
            amounts in prop::collection::vec((1i64..1_000, 0i64..1_200), 1..8),
            discount in 0i64..500,
        ) {
            let gross: i64 = amounts.iter().map(|(a, _)| a).sum();
            let mut fee = fee(gross, discount.min(gross));
            let insts: Vec<Installment> = amounts
                .iter()
                .map(|(amount, paid)| installment(&fee, *amount, (*paid).min(*amount)))
                .collect();

            let first = reconcile(&fee, &insts);
            fee.apply_totals(first);
            let second = reconcile(&fee, &insts);

            prop_assert_eq!(first, second);
            prop_assert!(fee.check_invariants().is_ok());
            prop_assert_eq!(first.status == FeeStatus::Paid, first.balance.is_zero());
        }
    }
}
