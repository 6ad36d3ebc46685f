use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{FeeId, FeeStatus, InstallmentId, InstallmentStatus, ReceiptType, SchoolId};

/// all events emitted while applying a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // installment events
    PaymentApplied {
        installment_id: InstallmentId,
        fee_id: FeeId,
        amount: Money,
        old_status: InstallmentStatus,
        new_status: InstallmentStatus,
        timestamp: DateTime<Utc>,
    },
    ReceiptAssigned {
        installment_id: InstallmentId,
        receipt_number: String,
        receipt_type: ReceiptType,
        timestamp: DateTime<Utc>,
    },

    // cascade events
    OverpaymentCascaded {
        from_installment: InstallmentId,
        to_installment: InstallmentId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    OverpaymentDiscarded {
        fee_id: FeeId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // fee events
    FeeReconciled {
        fee_id: FeeId,
        paid: Money,
        balance: Money,
        old_status: FeeStatus,
        new_status: FeeStatus,
        timestamp: DateTime<Utc>,
    },

    // numbering events
    ReceiptNumbersReserved {
        school_id: SchoolId,
        receipt_type: ReceiptType,
        first_counter: u64,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    ReceiptFallbackUsed {
        school_id: SchoolId,
        receipt_type: ReceiptType,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
