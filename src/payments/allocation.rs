use crate::decimal::Money;
use crate::records::Installment;
use crate::types::{InstallmentId, InstallmentStatus};

/// one installment's share of a payment
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// installment after the share was applied
    pub installment: Installment,
    pub applied: Money,
    pub previous_status: InstallmentStatus,
    /// reached through overpayment rather than paid directly
    pub cascaded: bool,
}

/// in-memory result of spreading a payment over installments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    /// excess no installment could take
    pub unapplied: Money,
}

impl AllocationPlan {
    pub fn total_applied(&self) -> Money {
        self.allocations.iter().map(|a| a.applied).sum()
    }

    pub fn installments(&self) -> impl Iterator<Item = &Installment> {
        self.allocations.iter().map(|a| &a.installment)
    }

    /// touched installments that reached partial/paid without a number
    pub fn receipts_needed(&self) -> usize {
        self.installments().filter(|i| i.needs_receipt()).count()
    }

    fn take(&mut self, mut installment: Installment, available: Money, cascaded: bool) -> Money {
        let previous_status = installment.status;
        let applied = installment.absorb(available);
        self.allocations.push(Allocation {
            installment,
            applied,
            previous_status,
            cascaded,
        });
        available - applied
    }

    /// feed `remaining` into `candidates` in order until it runs out
    fn spill(&mut self, candidates: Vec<Installment>, mut remaining: Money) -> Money {
        for installment in candidates {
            if !remaining.is_positive() {
                break;
            }
            remaining = self.take(installment, remaining, true);
        }
        remaining
    }
}

/// open installments earliest due first, optionally leaving one out.
///
/// The sort is stable: installments sharing a due date keep the order the
/// store returned them in.
pub fn cascade_order(installments: &[Installment], exclude: Option<InstallmentId>) -> Vec<Installment> {
    let mut open: Vec<Installment> = installments
        .iter()
        .filter(|i| i.status.is_open() && Some(i.id) != exclude)
        .cloned()
        .collect();
    open.sort_by_key(|i| i.due_date);
    open
}

/// apply `amount` to `target`, then, when `cascade` is set, push any excess
/// into the open `siblings` in due-date order
pub fn allocate(target: &Installment, siblings: &[Installment], amount: Money, cascade: bool) -> AllocationPlan {
    let mut plan = AllocationPlan::default();

    let mut remaining = plan.take(target.clone(), amount, false);
    if cascade && remaining.is_positive() {
        remaining = plan.spill(cascade_order(siblings, Some(target.id)), remaining);
    }

    plan.unapplied = remaining;
    plan
}

/// apply `amount` to a whole fee: the earliest open installment first, the
/// rest in due-date order
pub fn allocate_across(installments: &[Installment], amount: Money) -> AllocationPlan {
    let mut plan = AllocationPlan::default();
    let mut ordered = cascade_order(installments, None).into_iter();

    let remaining = match ordered.next() {
        Some(first) => {
            let left = plan.take(first, amount, false);
            plan.spill(ordered.collect(), left)
        }
        None => amount,
    };

    plan.unapplied = remaining;
    plan
}
