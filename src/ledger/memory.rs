use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{ReceiptCounterConfig, SchoolSettings, SettingsPatch};
use crate::errors::{LedgerError, Result};
use crate::records::{Fee, Installment};
use crate::types::{FeeId, InstallmentId, ReceiptType, SchoolId};

use super::{commit_sequentially, next_counter, Ledger, SettingsStore};

/// injected store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// the nth installment save from now fails (0 = the next one)
    SaveInstallment { after: usize },
    SaveFee,
    UpdateSettings,
    AdvanceCounter,
}

#[derive(Debug, Default)]
struct Inner {
    // a Vec keeps insertion order, which is the "store order" callers see
    installments: Vec<Installment>,
    fees: HashMap<FeeId, Fee>,
    settings: HashMap<SchoolId, SchoolSettings>,
    fail_point: Option<FailPoint>,
}

impl Inner {
    fn take_failure(&mut self, hit: impl Fn(&mut FailPoint) -> bool) -> bool {
        let Some(point) = self.fail_point.as_mut() else {
            return false;
        };
        if hit(point) {
            self.fail_point = None;
            return true;
        }
        false
    }

    fn put_installment(&mut self, installment: Installment) {
        match self.installments.iter_mut().find(|i| i.id == installment.id) {
            Some(existing) => *existing = installment,
            None => self.installments.push(installment),
        }
    }

    /// the write must start from the stored version, and an issued receipt
    /// number is never replaced
    fn check_installment(&self, incoming: &Installment) -> Result<()> {
        let Some(stored) = self.installments.iter().find(|i| i.id == incoming.id) else {
            return Ok(());
        };
        let receipt_replaced =
            stored.receipt_number.is_some() && stored.receipt_number != incoming.receipt_number;
        if stored.version != incoming.version || receipt_replaced {
            return Err(LedgerError::conflict("installment", incoming.id));
        }
        Ok(())
    }

    fn check_fee(&self, incoming: &Fee) -> Result<()> {
        match self.fees.get(&incoming.id) {
            Some(stored) if stored.version != incoming.version => {
                Err(LedgerError::conflict("fee", incoming.id))
            }
            _ => Ok(()),
        }
    }

    fn write_installment(&mut self, installment: &Installment) {
        let mut next = installment.clone();
        next.version = installment.version.wrapping_add(1);
        self.put_installment(next);
    }

    fn write_fee(&mut self, fee: &Fee) {
        let mut next = fee.clone();
        next.version = fee.version.wrapping_add(1);
        self.fees.insert(next.id, next);
    }
}

fn injected(what: &str) -> LedgerError {
    LedgerError::store(format!("injected failure: {}", what))
}

/// in-process ledger and settings store.
///
/// Counter advances and payment commits happen under one lock, so concurrent
/// callers never see duplicate counters or half-applied payments. A commit
/// re-derives the fee from the stored installments before writing it. Set
/// `sequential_commits` to fall back to one-record-at-a-time commits.
///
/// The `insert_*` helpers seed records as given, skipping version checks.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
    sequential_commits: bool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// a store whose `commit_payment` writes records one by one
    pub fn with_sequential_commits() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            sequential_commits: true,
        }
    }

    pub async fn insert_fee(&self, fee: Fee) {
        self.inner.lock().await.fees.insert(fee.id, fee);
    }

    pub async fn insert_installment(&self, installment: Installment) {
        self.inner.lock().await.put_installment(installment);
    }

    pub async fn insert_settings(&self, settings: SchoolSettings) {
        self.inner
            .lock()
            .await
            .settings
            .insert(settings.school_id, settings);
    }

    pub async fn fail_at(&self, point: FailPoint) {
        self.inner.lock().await.fail_point = Some(point);
    }
}

#[async_trait]
impl SettingsStore for InMemoryLedger {
    async fn get_settings(&self, school_id: SchoolId) -> Result<Option<SchoolSettings>> {
        Ok(self.inner.lock().await.settings.get(&school_id).cloned())
    }

    async fn update_settings(&self, school_id: SchoolId, patch: SettingsPatch) -> Result<SchoolSettings> {
        let mut inner = self.inner.lock().await;
        if inner.take_failure(|p| *p == FailPoint::UpdateSettings) {
            return Err(injected("update_settings"));
        }

        let settings = inner
            .settings
            .entry(school_id)
            .or_insert_with(|| SchoolSettings::new(school_id));
        settings.apply_patch(&patch);
        Ok(settings.clone())
    }

    async fn advance_counter(
        &self,
        school_id: SchoolId,
        receipt_type: ReceiptType,
        count: u64,
    ) -> Result<Option<ReceiptCounterConfig>> {
        let mut inner = self.inner.lock().await;
        if inner.take_failure(|p| *p == FailPoint::AdvanceCounter) {
            return Err(injected("advance_counter"));
        }

        let Some(settings) = inner.settings.get_mut(&school_id) else {
            return Ok(None);
        };

        let before = settings.counter_config(receipt_type);
        let next = next_counter(school_id, receipt_type, before.counter, count)?;
        settings.apply_patch(&SettingsPatch::counter(receipt_type, next));
        Ok(Some(before))
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_installment(&self, id: InstallmentId) -> Result<Option<Installment>> {
        let inner = self.inner.lock().await;
        Ok(inner.installments.iter().find(|i| i.id == id).cloned())
    }

    async fn save_installment(&self, installment: &Installment) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let failed = inner.take_failure(|p| match p {
            FailPoint::SaveInstallment { after: 0 } => true,
            FailPoint::SaveInstallment { after } => {
                *after -= 1;
                false
            }
            _ => false,
        });
        if failed {
            return Err(injected("save_installment"));
        }

        inner.check_installment(installment)?;
        inner.write_installment(installment);
        Ok(())
    }

    async fn get_installments_by_fee(&self, fee_id: FeeId) -> Result<Vec<Installment>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .installments
            .iter()
            .filter(|i| i.fee_id == fee_id)
            .cloned()
            .collect())
    }

    async fn get_fee(&self, id: FeeId) -> Result<Option<Fee>> {
        Ok(self.inner.lock().await.fees.get(&id).cloned())
    }

    async fn save_fee(&self, fee: &Fee) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.take_failure(|p| *p == FailPoint::SaveFee) {
            return Err(injected("save_fee"));
        }

        inner.check_fee(fee)?;
        inner.write_fee(fee);
        Ok(())
    }

    async fn commit_payment(&self, installments: &[Installment], fee: &Fee) -> Result<()> {
        if self.sequential_commits {
            return commit_sequentially(self, installments, fee).await;
        }

        let mut inner = self.inner.lock().await;

        // any armed write failure aborts the whole batch before anything lands
        let failed = inner.take_failure(|p| match p {
            FailPoint::SaveInstallment { after } => *after < installments.len(),
            FailPoint::SaveFee => true,
            _ => false,
        });
        if failed {
            return Err(injected("commit_payment"));
        }

        for installment in installments {
            inner.check_installment(installment)?;
        }
        inner.check_fee(fee)?;

        for installment in installments {
            inner.write_installment(installment);
        }

        let stored: Vec<Installment> = inner
            .installments
            .iter()
            .filter(|i| i.fee_id == fee.id)
            .cloned()
            .collect();
        let mut fee = fee.clone();
        fee.reconcile_with(&stored);
        inner.write_fee(&fee);
        Ok(())
    }
}
