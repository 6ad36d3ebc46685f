use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::Ledger;
use crate::receipts::{ReceiptNumberAllocator, Reservation, ReservationSource};
use crate::records::{Fee, Installment};
use crate::types::{FeeId, InstallmentId, ReceiptType};

use super::allocation::{allocate, allocate_across, AllocationPlan};
use super::{validate_amount, PaymentMeta, PaymentOutcome};

/// applies payments to installments and keeps fees reconciled
pub struct PaymentAllocationEngine<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    allocator: ReceiptNumberAllocator<L>,
    config: EngineConfig,
}

impl<L: Ledger + ?Sized> PaymentAllocationEngine<L> {
    pub fn new(ledger: Arc<L>, time: SafeTimeProvider) -> Self {
        Self::with_config(ledger, time, EngineConfig::default())
    }

    pub fn with_config(ledger: Arc<L>, time: SafeTimeProvider, config: EngineConfig) -> Self {
        let allocator = ReceiptNumberAllocator::new(Arc::clone(&ledger), time);
        Self {
            ledger,
            allocator,
            config,
        }
    }

    pub fn allocator(&self) -> &ReceiptNumberAllocator<L> {
        &self.allocator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// apply a payment to one installment, cascading any excess into the
    /// fee's later open installments, then reconcile the fee.
    ///
    /// Newly paid or partial installments draw from the installment receipt
    /// counter. Nothing is written when the amount is not positive or a
    /// record is missing. If another write lands on the fee between the read
    /// and the commit, the payment is re-read and re-planned.
    #[instrument(skip(self, meta))]
    pub async fn apply(
        &self,
        installment_id: InstallmentId,
        amount: Money,
        meta: PaymentMeta,
    ) -> Result<PaymentOutcome> {
        validate_amount(amount)?;
        self.retry_on_conflict(|| self.try_apply(installment_id, amount, &meta))
            .await
    }

    /// apply a payment against a whole fee, earliest open installment first.
    /// Receipt numbers come from the fee counter.
    #[instrument(skip(self, meta))]
    pub async fn apply_to_fee(&self, fee_id: FeeId, amount: Money, meta: PaymentMeta) -> Result<PaymentOutcome> {
        validate_amount(amount)?;
        self.retry_on_conflict(|| self.try_apply_to_fee(fee_id, amount, &meta))
            .await
    }

    async fn try_apply(
        &self,
        installment_id: InstallmentId,
        amount: Money,
        meta: &PaymentMeta,
    ) -> Result<PaymentOutcome> {
        let target = self
            .ledger
            .get_installment(installment_id)
            .await?
            .ok_or_else(|| LedgerError::installment_not_found(installment_id))?;
        let fee = self.load_fee(target.fee_id).await?;
        let installments = self.ledger.get_installments_by_fee(fee.id).await?;

        let plan = allocate(&target, &installments, amount, self.config.cascade_overpayment);
        self.settle(fee, installments, plan, ReceiptType::Installment, meta)
            .await
    }

    async fn try_apply_to_fee(&self, fee_id: FeeId, amount: Money, meta: &PaymentMeta) -> Result<PaymentOutcome> {
        let fee = self.load_fee(fee_id).await?;
        let installments = self.ledger.get_installments_by_fee(fee.id).await?;

        let plan = allocate_across(&installments, amount);
        self.settle(fee, installments, plan, ReceiptType::Fee, meta)
            .await
    }

    /// run `attempt` again while it fails with `Conflict`, up to the
    /// configured retry count. Numbers reserved by a discarded attempt are
    /// not reused.
    async fn retry_on_conflict<F, Fut>(&self, mut attempt: F) -> Result<PaymentOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PaymentOutcome>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err @ LedgerError::Conflict { .. }) if retries < self.config.max_conflict_retries => {
                    retries += 1;
                    warn!(error = %err, retries, "records changed before commit; re-planning payment");
                }
                result => return result,
            }
        }
    }

    /// recompute a fee from its stored installments and save it. Used to
    /// repair a fee after an interrupted commit.
    #[instrument(skip(self))]
    pub async fn reconcile_fee(&self, fee_id: FeeId) -> Result<Fee> {
        let mut fee = self.load_fee(fee_id).await?;
        let installments = self.ledger.get_installments_by_fee(fee_id).await?;

        if fee.reconcile_with(&installments) {
            self.ledger.save_fee(&fee).await?;
            info!(paid = %fee.paid, balance = %fee.balance, status = ?fee.status, "fee repaired");
        }
        Ok(fee)
    }

    /// move unpaid installments of a fee between unpaid/upcoming/overdue and
    /// save the ones that changed
    #[instrument(skip(self))]
    pub async fn refresh_schedule(&self, fee_id: FeeId, today: NaiveDate) -> Result<Vec<Installment>> {
        let installments = self.ledger.get_installments_by_fee(fee_id).await?;
        let window = self.config.upcoming_window_days;

        let mut changed = Vec::new();
        for mut installment in installments {
            if installment.refresh_schedule_status(today, window) {
                self.ledger.save_installment(&installment).await?;
                changed.push(installment);
            }
        }

        debug!(changed = changed.len(), "schedule statuses refreshed");
        Ok(changed)
    }

    async fn load_fee(&self, fee_id: FeeId) -> Result<Fee> {
        self.ledger
            .get_fee(fee_id)
            .await?
            .ok_or_else(|| LedgerError::fee_not_found(fee_id))
    }

    /// number, reconcile and commit a computed allocation
    async fn settle(
        &self,
        mut fee: Fee,
        installments: Vec<Installment>,
        mut plan: AllocationPlan,
        receipt_type: ReceiptType,
        meta: &PaymentMeta,
    ) -> Result<PaymentOutcome> {
        let mut events = EventStore::new();
        let now = self.allocator.now();

        let needed = plan.receipts_needed();
        let reservation = self.allocator.reserve(fee.school_id, receipt_type, needed).await;
        if needed > 0 {
            record_reservation(&mut events, &reservation, now);
        }
        let receipts_persisted = reservation.is_persisted();
        let mut numbers = reservation.numbers.into_iter();

        let source = plan.allocations.first().map(|a| a.installment.id);
        let mut receipt_numbers = Vec::new();

        for allocation in plan.allocations.iter_mut() {
            let installment = &mut allocation.installment;

            if allocation.applied.is_positive() {
                meta.stamp(installment);
                installment.paid_at = Some(now);
            }

            events.emit(Event::PaymentApplied {
                installment_id: installment.id,
                fee_id: installment.fee_id,
                amount: allocation.applied,
                old_status: allocation.previous_status,
                new_status: installment.status,
                timestamp: now,
            });

            if let (true, Some(from)) = (allocation.cascaded, source) {
                events.emit(Event::OverpaymentCascaded {
                    from_installment: from,
                    to_installment: installment.id,
                    amount: allocation.applied,
                    timestamp: now,
                });
            }

            if installment.needs_receipt() {
                if let Some(number) = numbers.next() {
                    installment.assign_receipt(number.clone());
                    events.emit(Event::ReceiptAssigned {
                        installment_id: installment.id,
                        receipt_number: number.clone(),
                        receipt_type,
                        timestamp: now,
                    });
                    receipt_numbers.push(number);
                }
            }
        }

        if plan.unapplied.is_positive() {
            warn!(fee_id = %fee.id, unapplied = %plan.unapplied, "payment exceeds open installments; excess dropped");
            events.emit(Event::OverpaymentDiscarded {
                fee_id: fee.id,
                amount: plan.unapplied,
                timestamp: now,
            });
        }

        let mut touched: Vec<Installment> = plan.installments().cloned().collect();
        let current: Vec<Installment> = installments
            .into_iter()
            .map(|stored| {
                touched
                    .iter()
                    .find(|t| t.id == stored.id)
                    .cloned()
                    .unwrap_or(stored)
            })
            .collect();

        let old_status = fee.status;
        fee.reconcile_with(&current);
        events.emit(Event::FeeReconciled {
            fee_id: fee.id,
            paid: fee.paid,
            balance: fee.balance,
            old_status,
            new_status: fee.status,
            timestamp: now,
        });

        for installment in &touched {
            installment.check_invariants()?;
        }
        fee.check_invariants()?;

        self.ledger.commit_payment(&touched, &fee).await?;
        for installment in touched.iter_mut() {
            installment.version = installment.version.wrapping_add(1);
        }
        fee.version = fee.version.wrapping_add(1);

        let applied = plan.total_applied();
        info!(
            fee_id = %fee.id,
            applied = %applied,
            installments = touched.len(),
            receipts = receipt_numbers.len(),
            fee_status = ?fee.status,
            "payment applied"
        );

        Ok(PaymentOutcome {
            updated_installments: touched,
            updated_fee: fee,
            receipt_numbers,
            applied,
            unapplied: plan.unapplied,
            receipts_persisted,
            events: events.take_events(),
        })
    }
}

fn record_reservation(events: &mut EventStore, reservation: &Reservation, now: chrono::DateTime<chrono::Utc>) {
    match &reservation.source {
        ReservationSource::Reserved { first_counter } => events.emit(Event::ReceiptNumbersReserved {
            school_id: reservation.school_id,
            receipt_type: reservation.receipt_type,
            first_counter: *first_counter,
            count: reservation.numbers.len(),
            timestamp: now,
        }),
        ReservationSource::Direct { reason, .. } | ReservationSource::Fallback { reason } => {
            events.emit(Event::ReceiptFallbackUsed {
                school_id: reservation.school_id,
                receipt_type: reservation.receipt_type,
                reason: reason.clone(),
                timestamp: now,
            })
        }
    }
}
