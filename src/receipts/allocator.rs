use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ReceiptCounterConfig;
use crate::errors::LedgerError;
use crate::ledger::SettingsStore;
use crate::types::{ReceiptType, SchoolId};

use super::format::{auto_prefix, format_receipt_number, timestamp_number};

/// where a batch of receipt numbers came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationSource {
    /// counter advanced in the store
    Reserved { first_counter: u64 },
    /// counter read but the advance failed; numbers were not persisted
    Direct { first_counter: u64, reason: String },
    /// no usable settings; timestamp numbers with the default prefix
    Fallback { reason: String },
}

/// numbers handed out by one `reserve` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub school_id: SchoolId,
    pub receipt_type: ReceiptType,
    pub numbers: Vec<String>,
    pub source: ReservationSource,
}

impl Reservation {
    /// whether the store recorded these numbers as issued
    pub fn is_persisted(&self) -> bool {
        matches!(self.source, ReservationSource::Reserved { .. })
    }
}

/// issues receipt numbers from the per-school counters.
///
/// Never fails: settings or store problems degrade to non-persisted or
/// timestamp numbers and are logged as warnings.
pub struct ReceiptNumberAllocator<S: SettingsStore + ?Sized> {
    store: Arc<S>,
    time: SafeTimeProvider,
}

impl<S: SettingsStore + ?Sized> ReceiptNumberAllocator<S> {
    pub fn new(store: Arc<S>, time: SafeTimeProvider) -> Self {
        Self { store, time }
    }

    /// current time from the allocator's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// reserve `count` consecutive numbers and advance the stored counter
    #[instrument(skip(self))]
    pub async fn reserve(&self, school_id: SchoolId, receipt_type: ReceiptType, count: usize) -> Reservation {
        let now = self.now();
        if count == 0 {
            return Reservation {
                school_id,
                receipt_type,
                numbers: Vec::new(),
                source: ReservationSource::Reserved { first_counter: 0 },
            };
        }

        match self
            .store
            .advance_counter(school_id, receipt_type, count as u64)
            .await
        {
            Ok(Some(cfg)) => match render_batch(&cfg, receipt_type, count, now) {
                Some(numbers) => {
                    debug!(first = cfg.counter, count, "receipt numbers reserved");
                    Reservation {
                        school_id,
                        receipt_type,
                        numbers,
                        source: ReservationSource::Reserved { first_counter: cfg.counter },
                    }
                }
                None => self.fallback(school_id, receipt_type, count, now, overflow(&cfg, count)),
            },
            Ok(None) => self.fallback(
                school_id,
                receipt_type,
                count,
                now,
                LedgerError::ConfigMissing { school_id },
            ),
            Err(err) => self.direct(school_id, receipt_type, count, now, err).await,
        }
    }

    /// what the next number would look like; nothing is persisted and the
    /// value may be issued to someone else
    pub async fn preview_next(&self, school_id: SchoolId, receipt_type: ReceiptType) -> String {
        let now = self.now();
        match self.store.get_settings(school_id).await {
            Ok(Some(settings)) => {
                let cfg = settings.counter_config(receipt_type);
                format_receipt_number(cfg.counter, &cfg, receipt_type, now)
            }
            _ => fallback_batch(receipt_type, 1, now).remove(0),
        }
    }

    /// counter advance failed: format from a fresh read without persisting
    async fn direct(
        &self,
        school_id: SchoolId,
        receipt_type: ReceiptType,
        count: usize,
        now: DateTime<Utc>,
        cause: LedgerError,
    ) -> Reservation {
        let failure = LedgerError::ReservationFailure {
            school_id,
            receipt_type,
            message: cause.to_string(),
        };
        warn!(error = %failure, "falling back to unreserved receipt numbers");

        let cfg = match self.store.get_settings(school_id).await {
            Ok(Some(settings)) => settings.counter_config(receipt_type),
            Ok(None) => {
                return self.fallback(
                    school_id,
                    receipt_type,
                    count,
                    now,
                    LedgerError::ConfigMissing { school_id },
                )
            }
            Err(_) => return self.fallback(school_id, receipt_type, count, now, failure),
        };

        match render_batch(&cfg, receipt_type, count, now) {
            Some(numbers) => Reservation {
                school_id,
                receipt_type,
                numbers,
                source: ReservationSource::Direct {
                    first_counter: cfg.counter,
                    reason: failure.to_string(),
                },
            },
            None => self.fallback(school_id, receipt_type, count, now, failure),
        }
    }

    fn fallback(
        &self,
        school_id: SchoolId,
        receipt_type: ReceiptType,
        count: usize,
        now: DateTime<Utc>,
        reason: LedgerError,
    ) -> Reservation {
        warn!(error = %reason, "using timestamp receipt numbers");

        Reservation {
            school_id,
            receipt_type,
            numbers: fallback_batch(receipt_type, count, now),
            source: ReservationSource::Fallback {
                reason: reason.to_string(),
            },
        }
    }
}

/// `count` numbers starting at `cfg.counter`; `None` if the range would run
/// past `u64::MAX`
fn render_batch(
    cfg: &ReceiptCounterConfig,
    receipt_type: ReceiptType,
    count: usize,
    now: DateTime<Utc>,
) -> Option<Vec<String>> {
    (0..count as u64)
        .map(|i| {
            let counter = cfg.counter.checked_add(i)?;
            Some(format_receipt_number(counter, cfg, receipt_type, now))
        })
        .collect()
}

fn overflow(cfg: &ReceiptCounterConfig, count: usize) -> LedgerError {
    LedgerError::store(format!("receipt counter {} cannot issue {} more numbers", cfg.counter, count))
}

/// timestamp numbers with the default prefix for `receipt_type`, spread one
/// millisecond apart so a batch never repeats itself
fn fallback_batch(receipt_type: ReceiptType, count: usize, now: DateTime<Utc>) -> Vec<String> {
    let prefix = auto_prefix(&ReceiptCounterConfig::default(), receipt_type);
    (0..count)
        .map(|i| timestamp_number(&prefix, now + Duration::milliseconds(i as i64)))
        .collect()
}
