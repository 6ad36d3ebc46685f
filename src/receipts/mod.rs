pub mod allocator;
pub mod format;

pub use allocator::{ReceiptNumberAllocator, Reservation, ReservationSource};
pub use format::{auto_prefix, format_receipt_number, timestamp_number};
