/// quick start - one fee, two installments, one overpayment
use std::sync::Arc;

use installment_ledger_rs::chrono::{NaiveDate, TimeZone, Utc};
use installment_ledger_rs::{
    Fee, FeeType, InMemoryLedger, Installment, Money, PaymentAllocationEngine, PaymentMeta,
    PaymentReceipt, ReceiptCounterConfig, SafeTimeProvider, SchoolSettings, TimeSource, Uuid,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ledger = Arc::new(InMemoryLedger::new());
    let school_id = Uuid::new_v4();

    // fee receipts as 1/2025, installment receipts as INV-1, INV-2, ...
    ledger
        .insert_settings(SchoolSettings::with_counters(
            school_id,
            ReceiptCounterConfig::yearly(2025),
            ReceiptCounterConfig::custom("INV-"),
        ))
        .await;

    let fee = Fee::new(school_id, Uuid::new_v4(), FeeType::Tuition, Money::from_major(600), Money::ZERO);
    ledger.insert_fee(fee.clone()).await;

    let first = Installment::new(fee.id, Money::from_major(300), NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    let second = Installment::new(fee.id, Money::from_major(300), NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    ledger.insert_installment(first.clone()).await;
    ledger.insert_installment(second).await;

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap()));
    let engine = PaymentAllocationEngine::new(ledger, time);

    // 450 covers the first installment and half of the second
    let outcome = engine
        .apply(first.id, Money::from_major(450), PaymentMeta::cash().with_note("september"))
        .await?;

    let receipt = PaymentReceipt::from_outcome(&outcome, engine.allocator().now());
    println!("{}", receipt.to_json_pretty()?);

    Ok(())
}
