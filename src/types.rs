use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for an installment
pub type InstallmentId = Uuid;

/// unique identifier for a fee
pub type FeeId = Uuid;

/// unique identifier for a school (owner of the receipt counters)
pub type SchoolId = Uuid;

/// unique identifier for a student
pub type StudentId = Uuid;

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    /// nothing paid, no particular due-date pressure
    Unpaid,
    /// nothing paid, due soon
    Upcoming,
    /// nothing paid, past due
    Overdue,
    /// some but not all of the amount paid
    Partial,
    /// fully paid
    Paid,
}

impl InstallmentStatus {
    /// statuses that carry a receipt number
    pub fn has_receipt(&self) -> bool {
        matches!(self, InstallmentStatus::Partial | InstallmentStatus::Paid)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, InstallmentStatus::Paid)
    }
}

/// fee status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Unpaid,
    Partial,
    Paid,
}

/// kind of fee the installments belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Tuition,
    Transportation,
    Activities,
    Uniform,
    Books,
    Other(String),
}

/// which of the two school counters a receipt number is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptType {
    Fee,
    Installment,
}

impl fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptType::Fee => write!(f, "fee"),
            ReceiptType::Installment => write!(f, "installment"),
        }
    }
}

/// receipt number layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReceiptFormat {
    /// prefix plus a millisecond timestamp
    #[default]
    Auto,
    /// bare counter
    Sequential,
    /// counter/yyyy
    Year,
    /// counter/yy
    ShortYear,
    /// prefix plus counter
    Custom,
    /// rendered like `Sequential`
    StudentSequential,
}

/// how a payment was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Check,
    Transfer,
    Card,
    Other(String),
}
