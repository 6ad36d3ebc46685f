pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{ReceiptCounterConfig, SchoolSettings, SettingsPatch};
use crate::errors::{LedgerError, Result};
use crate::records::{Fee, Installment};
use crate::types::{FeeId, InstallmentId, ReceiptType, SchoolId};

pub use memory::{FailPoint, InMemoryLedger};

/// per-school settings access
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self, school_id: SchoolId) -> Result<Option<SchoolSettings>>;

    async fn update_settings(&self, school_id: SchoolId, patch: SettingsPatch) -> Result<SchoolSettings>;

    /// move the counter for `receipt_type` forward by `count` and return the
    /// config as it was before the move, or `None` when the school has no
    /// settings.
    ///
    /// The default is a plain read followed by a write and is not safe under
    /// concurrent callers. Stores with an atomic increment should override it.
    async fn advance_counter(
        &self,
        school_id: SchoolId,
        receipt_type: ReceiptType,
        count: u64,
    ) -> Result<Option<ReceiptCounterConfig>> {
        let Some(settings) = self.get_settings(school_id).await? else {
            return Ok(None);
        };

        let before = settings.counter_config(receipt_type);
        let next = next_counter(school_id, receipt_type, before.counter, count)?;
        self.update_settings(school_id, SettingsPatch::counter(receipt_type, next))
            .await?;

        Ok(Some(before))
    }
}

/// installment and fee storage.
///
/// Writes are versioned: a save whose record carries a `version` other than
/// the stored one fails with `Conflict`, and a successful save stores the
/// record with `version + 1`. Records not yet in the store are accepted as is.
#[async_trait]
pub trait Ledger: SettingsStore {
    async fn get_installment(&self, id: InstallmentId) -> Result<Option<Installment>>;

    async fn save_installment(&self, installment: &Installment) -> Result<()>;

    /// all installments of a fee, in store order
    async fn get_installments_by_fee(&self, fee_id: FeeId) -> Result<Vec<Installment>>;

    async fn get_fee(&self, id: FeeId) -> Result<Option<Fee>>;

    async fn save_fee(&self, fee: &Fee) -> Result<()>;

    /// persist the installments touched by one payment plus the reconciled fee.
    ///
    /// Fails with `Conflict` when any record changed since it was read. The
    /// default checks versions up front and then saves one record at a time;
    /// see [`commit_sequentially`]. Transactional stores should override it
    /// with an all-or-nothing write that checks and writes under one lock.
    async fn commit_payment(&self, installments: &[Installment], fee: &Fee) -> Result<()> {
        commit_sequentially(self, installments, fee).await
    }
}

/// `counter + count`, or a store error when the counter would overflow
pub fn next_counter(school_id: SchoolId, receipt_type: ReceiptType, counter: u64, count: u64) -> Result<u64> {
    counter.checked_add(count).ok_or_else(|| {
        LedgerError::store(format!(
            "{} receipt counter for school {} overflows at {} + {}",
            receipt_type, school_id, counter, count
        ))
    })
}

/// save each installment then the fee. A failure after the first write is
/// reported as `PartialCommit` carrying the ids already saved.
///
/// Versions are compared before the first write, so a stale payment usually
/// fails cleanly with `Conflict`. A write racing in between the check and the
/// saves is still caught by the store's own versioned save.
pub async fn commit_sequentially<L>(ledger: &L, installments: &[Installment], fee: &Fee) -> Result<()>
where
    L: Ledger + ?Sized,
{
    for installment in installments {
        if let Some(stored) = ledger.get_installment(installment.id).await? {
            if stored.version != installment.version {
                return Err(LedgerError::conflict("installment", installment.id));
            }
        }
    }
    if let Some(stored) = ledger.get_fee(fee.id).await? {
        if stored.version != fee.version {
            return Err(LedgerError::conflict("fee", fee.id));
        }
    }

    let mut saved: Vec<Uuid> = Vec::with_capacity(installments.len() + 1);

    for installment in installments {
        if let Err(err) = ledger.save_installment(installment).await {
            return Err(partial(saved, err));
        }
        saved.push(installment.id);
    }

    if let Err(err) = ledger.save_fee(fee).await {
        return Err(partial(saved, err));
    }

    Ok(())
}

fn partial(saved: Vec<Uuid>, err: LedgerError) -> LedgerError {
    if saved.is_empty() {
        return err;
    }
    tracing::warn!(saved = saved.len(), error = %err, "payment commit stopped part way");
    LedgerError::PartialCommit {
        saved,
        message: err.to_string(),
    }
}
