//! Shared test fixtures.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use uuid::Uuid;

use crate::actor::Actor;
use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::entities::{Account, LoanApplication, LoanProduct, LoanRepayment, Transaction, User};
use crate::events::EventStore;
use crate::loans::LoanApplicationOrchestrator;
use crate::requests::{ApprovalRequest, LoanApplicationRequest, TransactionRequest};
use crate::store::LedgerStore;
use crate::types::{AccountId, AccountType, ApplicationId, CustomerId, RepaymentId, RepaymentStatus};
use crate::views::LoanApplicationView;

/// identifiers of a disbursed loan
#[derive(Debug, Clone, Copy)]
pub struct LoanFixture {
    pub customer_id: CustomerId,
    pub application_id: ApplicationId,
    pub savings_id: AccountId,
    pub loan_account_id: AccountId,
}

impl LoanFixture {
    /// unpaid first installment without fees
    pub fn repayment_row(interest: Money, principal: Money) -> LoanRepayment {
        let total = interest + principal;
        LoanRepayment {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            installment_number: 1,
            interest,
            monitoring_fee: Money::ZERO,
            processing_fee: Money::ZERO,
            principal,
            total,
            total_paid: Money::ZERO,
            total_due: total,
            total_interest_paid: Money::ZERO,
            status: RepaymentStatus::Pending,
            maturity_date: Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
            payment_date: None,
            days_overdue: 0,
        }
    }
}

/// engine over a fresh store with a controllable clock starting monday 2024-01-01 09:00
pub struct TestLedger {
    pub engine: LoanApplicationOrchestrator,
    pub store: Arc<LedgerStore>,
    pub time: SafeTimeProvider,
    pub officer: User,
    pub product: LoanProduct,
}

impl TestLedger {
    /// product charging 2% interest and no fees
    pub fn new() -> Self {
        Self::with_product(Rate::from_percentage(2), Rate::ZERO, Rate::ZERO)
    }

    pub fn with_product(interest: Rate, monitoring_fee: Rate, processing_fee: Rate) -> Self {
        let store = Arc::new(LedgerStore::new());
        let engine = LoanApplicationOrchestrator::with_store(Arc::clone(&store), EngineConfig::default()).unwrap();
        let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        let officer = engine.register_user("officer").unwrap();
        let product = engine
            .register_product("Weekly Loan", interest, monitoring_fee, processing_fee)
            .unwrap();
        Self {
            engine,
            store,
            time,
            officer,
            product,
        }
    }

    pub fn actor(&self) -> Actor {
        Actor::user(self.officer.id, self.officer.username.clone())
    }

    pub fn advance(&self, by: Duration) {
        self.time.test_control().unwrap().advance(by);
    }

    /// registered customer with an empty savings account
    pub fn customer(&self, name: &str) -> (CustomerId, AccountId) {
        let customer = self.engine.register_customer(name, None, &self.time).unwrap();
        let savings = self
            .engine
            .accounts()
            .open_account(customer.id, AccountType::Savings, None, &self.time)
            .unwrap();
        (customer.id, savings.id)
    }

    /// application request carrying exactly the required collateral
    pub fn request(&self, customer_id: CustomerId, amount: Money, tenor: u32) -> LoanApplicationRequest {
        LoanApplicationRequest {
            customer_id,
            product_id: self.product.id,
            applied_by: self.officer.id,
            group_id: None,
            amount,
            tenor,
            collateral_deposit: amount.percentage(Rate::from_percentage(10)),
            search_fee: Money::ZERO,
            forms_fee: Money::ZERO,
        }
    }

    pub fn approval(&self, application_id: ApplicationId, amount: Money, tenor: u32) -> ApprovalRequest {
        ApprovalRequest {
            loan_id: application_id,
            approver_id: self.officer.id,
            amount_approved: amount,
            tenor_approved: tenor,
        }
    }

    pub fn apply(&self, customer_id: CustomerId, amount: Money, tenor: u32) -> LoanApplicationView {
        self.engine
            .create_application(&self.request(customer_id, amount, tenor), &self.actor(), &self.time)
            .unwrap()
    }

    /// applied, approved and disbursed for a new customer
    pub fn active_loan(&self, amount: Money, tenor: u32) -> LoanFixture {
        let (customer_id, savings_id) = self.customer("Borrower");
        let application = self.apply(customer_id, amount, tenor);
        self.engine
            .approve(&self.approval(application.id, amount, tenor), &self.time)
            .unwrap();
        self.engine.disburse(application.id, self.officer.id, &self.time).unwrap();

        let loan_account_id = self
            .store
            .begin()
            .loan_account_for(application.id)
            .unwrap()
            .id;
        LoanFixture {
            customer_id,
            application_id: application.id,
            savings_id,
            loan_account_id,
        }
    }

    pub fn deposit(&self, account_id: AccountId, amount: Money) {
        let request = TransactionRequest::credit(account_id, amount, "Cash deposit");
        self.engine
            .accounts()
            .post_transaction(&request, &self.actor(), &self.time, &mut EventStore::new())
            .unwrap();
    }

    /// empty the account through a manual debit
    pub fn withdraw_all(&self, account_id: AccountId) {
        let balance = self.balance(account_id);
        if !balance.is_positive() {
            return;
        }
        let request = TransactionRequest::debit(account_id, balance, "Cash withdrawal");
        self.engine
            .accounts()
            .post_transaction(&request, &self.actor(), &self.time, &mut EventStore::new())
            .unwrap();
    }

    /// move the account to an unknown owner so lookups by customer miss it
    pub fn detach_savings(&self, account_id: AccountId) {
        self.store
            .transaction(|uow| {
                let mut account = uow.find::<Account>(account_id)?;
                account.customer_id = Uuid::new_v4();
                uow.save(account);
                Ok(())
            })
            .unwrap();
    }

    pub fn account(&self, account_id: AccountId) -> Account {
        self.store.begin().find::<Account>(account_id).unwrap()
    }

    pub fn balance(&self, account_id: AccountId) -> Money {
        self.account(account_id).balance
    }

    pub fn application(&self, application_id: ApplicationId) -> LoanApplication {
        self.store.begin().find::<LoanApplication>(application_id).unwrap()
    }

    pub fn repayment(&self, repayment_id: RepaymentId) -> LoanRepayment {
        self.store.begin().find::<LoanRepayment>(repayment_id).unwrap()
    }

    pub fn repayments(&self, application_id: ApplicationId) -> Vec<LoanRepayment> {
        self.store.begin().repayments_for(application_id)
    }

    pub fn transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        self.store.begin().transactions_for(account_id)
    }

    /// amount still owed over the open installments
    pub fn open_due(&self, application_id: ApplicationId) -> Money {
        self.store
            .begin()
            .open_repayments_for(application_id)
            .iter()
            .map(|r| r.total_due)
            .sum()
    }
}
