pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod payments;
pub mod receipts;
pub mod reconcile;
pub mod records;
pub mod types;
pub mod views;

// re-export key types
pub use config::{EngineConfig, ReceiptCounterConfig, SchoolSettings, SettingsPatch};
pub use decimal::Money;
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{FailPoint, InMemoryLedger, Ledger, SettingsStore};
pub use payments::{PaymentAllocationEngine, PaymentMeta, PaymentOutcome};
pub use receipts::{ReceiptNumberAllocator, Reservation, ReservationSource};
pub use reconcile::{reconcile, FeeTotals};
pub use records::{Fee, Installment};
pub use types::{
    FeeId, FeeStatus, FeeType, InstallmentId, InstallmentStatus, PaymentMethod, ReceiptFormat,
    ReceiptType, SchoolId, StudentId,
};
pub use views::PaymentReceipt;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
