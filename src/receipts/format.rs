use chrono::{DateTime, Datelike, Utc};

use crate::config::{ReceiptCounterConfig, DEFAULT_FEE_PREFIX};
use crate::types::{ReceiptFormat, ReceiptType};

/// prefix for `Auto` numbers: the configured one, or `R-` for fee receipts
/// when nothing is configured. Installment receipts may stay unprefixed.
pub fn auto_prefix(cfg: &ReceiptCounterConfig, receipt_type: ReceiptType) -> String {
    let configured = cfg.prefix.trim();
    match receipt_type {
        ReceiptType::Fee if configured.is_empty() => DEFAULT_FEE_PREFIX.to_string(),
        _ => cfg.prefix.clone(),
    }
}

/// render `counter` in the configured layout.
///
/// `now` is only read by `Auto` and by the year layouts when no year is
/// configured. `Auto` numbers end in the counter, so two numbers from the same
/// counter never collide even when issued in the same millisecond.
pub fn format_receipt_number(
    counter: u64,
    cfg: &ReceiptCounterConfig,
    receipt_type: ReceiptType,
    now: DateTime<Utc>,
) -> String {
    match cfg.format {
        ReceiptFormat::Sequential | ReceiptFormat::StudentSequential => counter.to_string(),
        ReceiptFormat::Year => {
            let year = cfg.year.unwrap_or_else(|| now.year());
            format!("{}/{}", counter, year)
        }
        ReceiptFormat::ShortYear => {
            let year = cfg.year.unwrap_or_else(|| now.year());
            format!("{}/{:02}", counter, year.rem_euclid(100))
        }
        ReceiptFormat::Custom => format!("{}{}", cfg.prefix, counter),
        ReceiptFormat::Auto => {
            format!("{}-{}", timestamp_number(&auto_prefix(cfg, receipt_type), now), counter)
        }
    }
}

/// prefix followed by the millisecond timestamp
pub fn timestamp_number(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}{}", prefix, now.timestamp_millis())
}
