use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{ReceiptType, SchoolId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("invalid payment amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("receipt counter reservation failed for school {school_id} ({receipt_type:?}): {message}")]
    ReservationFailure {
        school_id: SchoolId,
        receipt_type: ReceiptType,
        message: String,
    },

    #[error("no receipt settings for school {school_id}")]
    ConfigMissing {
        school_id: SchoolId,
    },

    #[error("store error: {message}")]
    Store {
        message: String,
    },

    #[error("payment partially committed ({} records saved): {message}", .saved.len())]
    PartialCommit {
        saved: Vec<Uuid>,
        message: String,
    },

    #[error("{entity} {id} changed since it was read")]
    Conflict {
        entity: &'static str,
        id: Uuid,
    },

    #[error("invariant violated: {message}")]
    InvariantViolation {
        message: String,
    },
}

impl LedgerError {
    pub fn installment_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "installment", id }
    }

    pub fn fee_not_found(id: Uuid) -> Self {
        LedgerError::NotFound { entity: "fee", id }
    }

    pub fn conflict(entity: &'static str, id: Uuid) -> Self {
        LedgerError::Conflict { entity, id }
    }

    pub fn store(message: impl Into<String>) -> Self {
        LedgerError::Store { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
