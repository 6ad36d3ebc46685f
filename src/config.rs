use serde::{Deserialize, Serialize};

use crate::types::{ReceiptFormat, ReceiptType, SchoolId};

/// prefix used for fee receipts when no settings exist or the prefix is blank
pub const DEFAULT_FEE_PREFIX: &str = "R-";

fn first_counter() -> u64 {
    1
}

/// numbering state for one (school, receipt type) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCounterConfig {
    pub format: ReceiptFormat,
    pub prefix: String,
    /// next number to issue
    pub counter: u64,
    pub year: Option<i32>,
}

impl Default for ReceiptCounterConfig {
    fn default() -> Self {
        Self {
            format: ReceiptFormat::Auto,
            prefix: String::new(),
            counter: first_counter(),
            year: None,
        }
    }
}

impl ReceiptCounterConfig {
    /// plain 1, 2, 3 numbering
    pub fn sequential() -> Self {
        Self {
            format: ReceiptFormat::Sequential,
            ..Self::default()
        }
    }

    /// 1/2025, 2/2025, ...
    pub fn yearly(year: i32) -> Self {
        Self {
            format: ReceiptFormat::Year,
            year: Some(year),
            ..Self::default()
        }
    }

    /// 1/25, 2/25, ...
    pub fn short_yearly(year: i32) -> Self {
        Self {
            format: ReceiptFormat::ShortYear,
            year: Some(year),
            ..Self::default()
        }
    }

    /// INV-1, INV-2, ...
    pub fn custom(prefix: impl Into<String>) -> Self {
        Self {
            format: ReceiptFormat::Custom,
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// timestamp based numbering
    pub fn auto(prefix: impl Into<String>) -> Self {
        Self {
            format: ReceiptFormat::Auto,
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn starting_at(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }
}

/// per-school receipt settings as stored by the settings service.
///
/// The wire layout is flat with camelCase keys, one group of four fields per
/// counter (`receiptNumber*` for fees, `installmentReceiptNumber*` for
/// installments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSettings {
    pub school_id: SchoolId,

    #[serde(default)]
    pub receipt_number_format: ReceiptFormat,
    #[serde(default)]
    pub receipt_number_prefix: String,
    #[serde(default = "first_counter")]
    pub receipt_number_counter: u64,
    #[serde(default)]
    pub receipt_number_year: Option<i32>,

    #[serde(default)]
    pub installment_receipt_number_format: ReceiptFormat,
    #[serde(default)]
    pub installment_receipt_number_prefix: String,
    #[serde(default = "first_counter")]
    pub installment_receipt_number_counter: u64,
    #[serde(default)]
    pub installment_receipt_number_year: Option<i32>,
}

impl SchoolSettings {
    pub fn new(school_id: SchoolId) -> Self {
        Self::with_counters(
            school_id,
            ReceiptCounterConfig::default(),
            ReceiptCounterConfig::default(),
        )
    }

    pub fn with_counters(
        school_id: SchoolId,
        fee: ReceiptCounterConfig,
        installment: ReceiptCounterConfig,
    ) -> Self {
        Self {
            school_id,
            receipt_number_format: fee.format,
            receipt_number_prefix: fee.prefix,
            receipt_number_counter: fee.counter,
            receipt_number_year: fee.year,
            installment_receipt_number_format: installment.format,
            installment_receipt_number_prefix: installment.prefix,
            installment_receipt_number_counter: installment.counter,
            installment_receipt_number_year: installment.year,
        }
    }

    /// counter config for one receipt type
    pub fn counter_config(&self, receipt_type: ReceiptType) -> ReceiptCounterConfig {
        match receipt_type {
            ReceiptType::Fee => ReceiptCounterConfig {
                format: self.receipt_number_format,
                prefix: self.receipt_number_prefix.clone(),
                counter: self.receipt_number_counter,
                year: self.receipt_number_year,
            },
            ReceiptType::Installment => ReceiptCounterConfig {
                format: self.installment_receipt_number_format,
                prefix: self.installment_receipt_number_prefix.clone(),
                counter: self.installment_receipt_number_counter,
                year: self.installment_receipt_number_year,
            },
        }
    }

    pub fn counter(&self, receipt_type: ReceiptType) -> u64 {
        match receipt_type {
            ReceiptType::Fee => self.receipt_number_counter,
            ReceiptType::Installment => self.installment_receipt_number_counter,
        }
    }

    pub fn apply_patch(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.receipt_number_format {
            self.receipt_number_format = v;
        }
        if let Some(v) = &patch.receipt_number_prefix {
            self.receipt_number_prefix = v.clone();
        }
        if let Some(v) = patch.receipt_number_counter {
            self.receipt_number_counter = v;
        }
        if let Some(v) = patch.receipt_number_year {
            self.receipt_number_year = Some(v);
        }
        if let Some(v) = patch.installment_receipt_number_format {
            self.installment_receipt_number_format = v;
        }
        if let Some(v) = &patch.installment_receipt_number_prefix {
            self.installment_receipt_number_prefix = v.clone();
        }
        if let Some(v) = patch.installment_receipt_number_counter {
            self.installment_receipt_number_counter = v;
        }
        if let Some(v) = patch.installment_receipt_number_year {
            self.installment_receipt_number_year = Some(v);
        }
    }
}

/// partial settings update; `None` leaves the stored value alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number_format: Option<ReceiptFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number_counter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment_receipt_number_format: Option<ReceiptFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment_receipt_number_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment_receipt_number_counter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment_receipt_number_year: Option<i32>,
}

impl SettingsPatch {
    /// patch that only moves one counter
    pub fn counter(receipt_type: ReceiptType, value: u64) -> Self {
        match receipt_type {
            ReceiptType::Fee => Self {
                receipt_number_counter: Some(value),
                ..Self::default()
            },
            ReceiptType::Installment => Self {
                installment_receipt_number_counter: Some(value),
                ..Self::default()
            },
        }
    }
}

/// engine behaviour knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// push the excess of a payment into later installments of the same fee
    pub cascade_overpayment: bool,
    /// unpaid installments due within this many days count as upcoming
    pub upcoming_window_days: u32,
    /// times a payment is re-read and re-planned after its records changed
    /// underneath it
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cascade_overpayment: true,
            upcoming_window_days: 7,
            max_conflict_retries: 3,
        }
    }
}

impl EngineConfig {
    /// apply each payment to its installment only, dropping any excess
    pub fn without_cascade() -> Self {
        Self {
            cascade_overpayment: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_settings_wire_format() {
        let school_id = Uuid::new_v4();
        let value = json!({
            "schoolId": school_id,
            "receiptNumberFormat": "year",
            "receiptNumberCounter": 42,
            "receiptNumberYear": 2025,
            "installmentReceiptNumberFormat": "custom",
            "installmentReceiptNumberPrefix": "INST-",
        });

        let settings: SchoolSettings = serde_json::from_value(value).unwrap();

        let fee = settings.counter_config(ReceiptType::Fee);
        assert_eq!(fee.format, ReceiptFormat::Year);
        assert_eq!(fee.counter, 42);
        assert_eq!(fee.year, Some(2025));
        assert_eq!(fee.prefix, "");

        let installment = settings.counter_config(ReceiptType::Installment);
        assert_eq!(installment.format, ReceiptFormat::Custom);
        assert_eq!(installment.prefix, "INST-");
        // missing counter starts at one
        assert_eq!(installment.counter, 1);
    }

    #[test]
    fn test_counter_patch_touches_one_counter() {
        let mut settings = SchoolSettings::with_counters(
            Uuid::new_v4(),
            ReceiptCounterConfig::sequential().starting_at(10),
            ReceiptCounterConfig::custom("INV-").starting_at(3),
        );

        settings.apply_patch(&SettingsPatch::counter(ReceiptType::Installment, 8));

        assert_eq!(settings.counter(ReceiptType::Fee), 10);
        assert_eq!(settings.counter(ReceiptType::Installment), 8);
        assert_eq!(settings.installment_receipt_number_prefix, "INV-");
    }

    #[test]
    fn test_engine_config_fills_missing_fields() {
        let cfg: EngineConfig = serde_json::from_value(json!({ "cascade_overpayment": false })).unwrap();
        assert!(!cfg.cascade_overpayment);
        assert_eq!(cfg.upcoming_window_days, 7);
        assert_eq!(cfg.max_conflict_retries, 3);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = SettingsPatch::counter(ReceiptType::Fee, 7);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, json!({ "receiptNumberCounter": 7 }));
    }
}
