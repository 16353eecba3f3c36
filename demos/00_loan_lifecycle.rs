/// loan lifecycle - apply, approve, disburse, collect and liquidate with controlled time
use chrono::{Duration, TimeZone, Utc};
use microloan_ledger_rs::{
    AccountType, Actor, ApprovalRequest, EngineConfig, EventStore, LiquidationRequest, LoanApplicationOrchestrator,
    LoanApplicationRequest, Money, Rate, SafeTimeProvider, TimeSource, TransactionRequest,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== loan lifecycle example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
    let controller = time.test_control().unwrap();
    let engine = LoanApplicationOrchestrator::new(EngineConfig::default())?;

    // reference data
    let officer = engine.register_user("officer")?;
    let actor = Actor::user(officer.id, officer.username.clone());
    let product = engine.register_product(
        "Weekly Trader Loan",
        Rate::from_percentage(2),
        Rate::from_percentage(1),
        Rate::ZERO,
    )?;
    let customer = engine.register_customer("Amina Bello", Some("08030000000".to_string()), &time)?;
    let savings = engine
        .accounts()
        .open_account(customer.id, AccountType::Savings, None, &time)?;

    // apply with 10% collateral
    let application = engine.create_application(
        &LoanApplicationRequest {
            customer_id: customer.id,
            product_id: product.id,
            applied_by: officer.id,
            group_id: None,
            amount: Money::from_major(10_000),
            tenor: 1,
            collateral_deposit: Money::from_major(1_000),
            search_fee: Money::ZERO,
            forms_fee: Money::ZERO,
        },
        &actor,
        &time,
    )?;
    println!("application {} is {:?}", application.id, application.status);

    engine.approve(
        &ApprovalRequest {
            loan_id: application.id,
            approver_id: officer.id,
            amount_approved: Money::from_major(10_000),
            tenor_approved: 1,
        },
        &time,
    )?;
    let disbursed = engine.disburse(application.id, officer.id, &time)?;
    println!(
        "disbursed: {} installments, {} repayable",
        disbursed.schedule.installments, disbursed.schedule.total_repayable
    );

    // two weekly collections
    for week in 1..=2 {
        controller.advance(Duration::days(7));
        let report = engine.repay(&time);
        println!("week {week}: collected {} installment(s)", report.collected().len());
    }

    // top up and settle early
    let topup = TransactionRequest::credit(savings.id, Money::from_major(300), "Cash deposit");
    engine.accounts().post_transaction(&topup, &actor, &time, &mut EventStore::new())?;
    let liquidation = engine.liquidate(
        &LiquidationRequest {
            loan_id: application.id,
            reason: "Early payoff".to_string(),
            interest_charged: Money::from_major(100),
        },
        &actor,
        &time,
    )?;
    println!("\nliquidation:\n{}", liquidation.to_json_pretty()?);

    let view = engine.find(application.id)?;
    println!("\nfinal state:\n{}", view.to_json_pretty()?);
    println!("\n{} events published", engine.take_events().len());

    Ok(())
}
