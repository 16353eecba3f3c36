/// adashe commission - daily deposits and the commission charged on withdrawal
use chrono::{TimeZone, Utc};
use microloan_ledger_rs::{
    AccountType, EngineConfig, EventStore, LoanApplicationOrchestrator, Money, Rate, SafeTimeProvider, TimeSource,
    TransactionRequest,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== adashe commission example ===\n");

    // a wednesday
    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap()));
    let engine = LoanApplicationOrchestrator::new(EngineConfig::default())?;
    let actor = engine.system_actor();

    // 3% per 30 days, deposits of at least 200
    let setup = engine.publish_adashe_setup(Rate::from_percentage(3), Money::from_major(200), &time)?;
    println!("adashe setup v{}: {}", setup.version, setup.commission_rate);

    let customer = engine.register_customer("Ngozi Okafor", None, &time)?;
    let account = engine
        .accounts()
        .open_account(customer.id, AccountType::Adashe, None, &time)?;

    // four days of 600, back-dated one day at a time and skipping sunday
    let mut events = EventStore::new();
    let deposit = TransactionRequest::credit(account.id, Money::from_major(600), "Daily contribution").for_days(4);
    let posted = engine.accounts().post_transaction(&deposit, &actor, &time, &mut events)?;
    for transaction in &posted.transactions {
        println!(
            "{}  {:>8}  {}",
            transaction.recorded_at.format("%a %Y-%m-%d"),
            transaction.amount,
            transaction.description
        );
    }
    println!("balance after deposits: {}", posted.balance);

    let withdrawal = TransactionRequest::debit(account.id, Money::from_major(1_200), "Cash withdrawal");
    let posted = engine.accounts().post_transaction(&withdrawal, &actor, &time, &mut events)?;
    if let Some(commission) = &posted.commission {
        println!("\ncommission charged: {}", commission.amount);
    }
    println!("balance after withdrawal: {}", posted.balance);

    let accrued = engine.commissions_between(time.now() - chrono::Duration::days(30), time.now());
    println!("\n{} commission record(s) this month", accrued.len());
    println!("{} event(s) emitted", events.events().len());

    Ok(())
}
