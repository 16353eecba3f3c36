use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use hourglass_rs::SafeTimeProvider;
use tracing::instrument;

use crate::actor::Actor;
use crate::adashe::{self, AdasheCommissionCalculator};
use crate::config::EngineConfig;
use crate::decimal::Money;
use crate::entities::{Account, AdasheCommission, Customer, Transaction, User};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::requests::{validate_request, TransactionRequest};
use crate::store::{LedgerStore, UnitOfWork};
use crate::types::{AccountId, AccountType, CustomerId, TransactionType};

use super::{new_reference, TransactionLedger};

/// outcome of a manual posting
#[derive(Debug, Clone, PartialEq)]
pub struct PostingResult {
    pub reference: String,
    pub transactions: Vec<Transaction>,
    pub commission: Option<AdasheCommission>,
    pub balance: Money,
}

/// customer-facing account operations
pub struct AccountDesk<'a> {
    store: &'a LedgerStore,
    config: &'a EngineConfig,
}

impl<'a> AccountDesk<'a> {
    pub fn new(store: &'a LedgerStore, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// open a SAVINGS or ADASHE account for a registered customer
    #[instrument(name = "ledger.open_account", skip(self, time_provider), err)]
    pub fn open_account(
        &self,
        customer_id: CustomerId,
        account_type: AccountType,
        name: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Account> {
        if !account_type.is_customer_opened() {
            return Err(LedgerError::ValidationFailed {
                violations: vec![format!("account_type: {account_type:?} accounts are opened by the loan engine")],
            });
        }

        let _guard = self.store.lock(&[customer_id]);
        self.store.transaction(|uow| {
            uow.find::<Customer>(customer_id)?;
            let name = name.unwrap_or_else(|| account_type.default_name().to_string());
            let account = Account::open(customer_id, account_type, name, time_provider.now());
            tracing::info!(account_id = %account.id, account_number = %account.account_number, "account opened");
            Ok(uow.save(account))
        })
    }

    /// account history, oldest first
    pub fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.store.read(|uow| {
            uow.find::<Account>(account_id)?;
            Ok(uow.transactions_for(account_id))
        })
    }

    /// manual credit or debit; adashe accounts get batch credits and debit commission
    #[instrument(
        name = "ledger.post_transaction",
        skip(self, actor, time_provider, events),
        fields(account_id = %request.account_id, amount = %request.amount),
        err
    )]
    pub fn post_transaction(
        &self,
        request: &TransactionRequest,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PostingResult> {
        validate_request(request)?;

        let owner = self.store.read(|uow| uow.find::<Account>(request.account_id))?.customer_id;
        let _guard = self.store.lock(&[owner]);

        let mut local = EventStore::new();
        let result = self.store.transaction(|uow| {
            let mut account = uow.find::<Account>(request.account_id)?;
            if !account.account_type.accepts_manual_postings() {
                return Err(LedgerError::ValidationFailed {
                    violations: vec![format!(
                        "account_id: {:?} accounts only move through the loan engine",
                        account.account_type
                    )],
                });
            }
            if !account.is_active() {
                return Err(LedgerError::InvalidStateTransition {
                    current: format!("{:?}", account.status),
                    requested: "posting".to_string(),
                });
            }

            let actor_name = request
                .user_id
                .and_then(|id| uow.get::<User>(id))
                .map(|user| user.username)
                .unwrap_or_else(|| actor.username.clone());
            let now = time_provider.now();
            let reference = new_reference(now);

            match (request.transaction_type, account.account_type) {
                (TransactionType::Credit, AccountType::Adashe) => {
                    self.credit_adashe(uow, &mut account, request, &reference, &actor_name, now)
                }
                (TransactionType::Credit, _) => {
                    let transaction = TransactionLedger::record(
                        uow,
                        &mut account,
                        &request.description,
                        request.amount,
                        &reference,
                        Some(actor_name.as_str()),
                        now,
                    );
                    Ok(PostingResult {
                        reference,
                        transactions: vec![transaction],
                        commission: None,
                        balance: account.balance,
                    })
                }
                (TransactionType::Debit, AccountType::Adashe) => {
                    self.debit_adashe(uow, &mut account, request, &reference, &actor_name, now, &mut local)
                }
                (TransactionType::Debit, _) => {
                    if account.balance < request.amount {
                        return Err(LedgerError::InsufficientBalance {
                            available: account.balance,
                            required: request.amount,
                        });
                    }
                    let transaction = TransactionLedger::record(
                        uow,
                        &mut account,
                        &request.description,
                        -request.amount,
                        &reference,
                        Some(actor_name.as_str()),
                        now,
                    );
                    Ok(PostingResult {
                        reference,
                        transactions: vec![transaction],
                        commission: None,
                        balance: account.balance,
                    })
                }
            }
        })?;

        events.absorb(&mut local);
        Ok(result)
    }

    /// one deposit per day, walking back from today and skipping sundays
    fn credit_adashe(
        &self,
        uow: &mut UnitOfWork<'_>,
        account: &mut Account,
        request: &TransactionRequest,
        reference: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<PostingResult> {
        let setup = adashe::latest_setup(uow)?;
        if request.amount < setup.minimum_deposit {
            return Err(LedgerError::ValidationFailed {
                violations: vec![format!(
                    "amount: daily deposit {} is below the minimum {}",
                    request.amount, setup.minimum_deposit
                )],
            });
        }

        let mut transactions = Vec::new();
        for (i, date) in deposit_days(now, request.day_count()).into_iter().enumerate() {
            let day = i + 1;
            transactions.push(TransactionLedger::record(
                uow,
                account,
                &format!("{} (Day {day})", request.description),
                request.amount,
                &format!("{reference}-{day}"),
                Some(actor),
                date,
            ));
        }

        Ok(PostingResult {
            reference: reference.to_string(),
            transactions,
            commission: None,
            balance: account.balance,
        })
    }

    /// withdrawal plus the accrued commission, both through the ledger
    #[allow(clippy::too_many_arguments)]
    fn debit_adashe(
        &self,
        uow: &mut UnitOfWork<'_>,
        account: &mut Account,
        request: &TransactionRequest,
        reference: &str,
        actor: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<PostingResult> {
        let setup = adashe::latest_setup(uow)?;
        let calculator = AdasheCommissionCalculator::new(&self.config.commission);
        let quote = calculator.calculate(uow, account.id, request.amount, &setup, now)?;

        let required = request.amount + quote.commission;
        if account.balance < required {
            return Err(LedgerError::InsufficientBalance {
                available: account.balance,
                required,
            });
        }

        let mut transactions = vec![TransactionLedger::record(
            uow,
            account,
            &request.description,
            -request.amount,
            reference,
            Some(actor),
            now,
        )];
        if quote.commission.is_positive() {
            transactions.push(TransactionLedger::record(
                uow,
                account,
                "Adashe commission",
                -quote.commission,
                reference,
                Some(actor),
                now,
            ));
        }
        let commission = calculator.accrue(uow, account.id, &quote, reference);

        events.emit(Event::CommissionAccrued {
            account_id: account.id,
            amount: quote.commission,
            commission_days: quote.commission_days,
            timestamp: now,
        });

        Ok(PostingResult {
            reference: reference.to_string(),
            transactions,
            commission: Some(commission),
            balance: account.balance,
        })
    }
}

/// `count` posting dates ending today, sundays excluded
fn deposit_days(now: DateTime<Utc>, count: u32) -> Vec<DateTime<Utc>> {
    (0..)
        .map(|offset| now - Duration::days(offset))
        .filter(|date| date.weekday() != Weekday::Sun)
        .take(count as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    struct Fixture {
        store: LedgerStore,
        config: EngineConfig,
        time: SafeTimeProvider,
        customer_id: CustomerId,
    }

    impl Fixture {
        fn new() -> Self {
            // a wednesday
            let time = SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap()));
            let store = LedgerStore::new();
            let customer = Customer::new("Chinedu", time.now());
            let customer_id = customer.id;
            store
                .transaction(|uow| {
                    uow.save(customer);
                    adashe::publish_setup(uow, Rate::from_percentage(3), Money::from_major(200), time.now())?;
                    Ok(())
                })
                .unwrap();
            Self {
                store,
                config: EngineConfig::default(),
                time,
                customer_id,
            }
        }

        fn desk(&self) -> AccountDesk<'_> {
            AccountDesk::new(&self.store, &self.config)
        }

        fn open(&self, account_type: AccountType) -> Account {
            self.desk().open_account(self.customer_id, account_type, None, &self.time).unwrap()
        }

        fn post(&self, request: TransactionRequest, events: &mut EventStore) -> Result<PostingResult> {
            self.desk().post_transaction(&request, &Actor::system("SYSTEM"), &self.time, events)
        }

        fn balance(&self, account_id: AccountId) -> Money {
            self.store.begin().find::<Account>(account_id).unwrap().balance
        }
    }

    #[test]
    fn test_only_customer_accounts_can_be_opened() {
        let fx = Fixture::new();
        let account = fx.open(AccountType::Savings);
        assert_eq!(account.name, "Savings");

        let err = fx
            .desk()
            .open_account(fx.customer_id, AccountType::Loan, None, &fx.time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed { .. }));

        let err = fx
            .desk()
            .open_account(uuid::Uuid::new_v4(), AccountType::Savings, None, &fx.time)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_savings_credit_and_debit() {
        let fx = Fixture::new();
        let savings = fx.open(AccountType::Savings);
        let mut events = EventStore::new();

        fx.post(TransactionRequest::credit(savings.id, Money::from_major(1_000), "Deposit"), &mut events)
            .unwrap();
        let result = fx
            .post(TransactionRequest::debit(savings.id, Money::from_major(400), "Withdrawal"), &mut events)
            .unwrap();

        assert_eq!(result.balance, Money::from_major(600));
        assert_eq!(result.transactions[0].amount, -Money::from_major(400));
        assert_eq!(result.transactions[0].actor.as_deref(), Some("SYSTEM"));
        assert_eq!(fx.desk().transactions_for(savings.id).unwrap().len(), 2);
    }

    #[test]
    fn test_overdraw_rejected_without_mutation() {
        let fx = Fixture::new();
        let savings = fx.open(AccountType::Savings);
        let mut events = EventStore::new();
        fx.post(TransactionRequest::credit(savings.id, Money::from_major(100), "Deposit"), &mut events)
            .unwrap();

        let err = fx
            .post(TransactionRequest::debit(savings.id, Money::from_major(101), "Withdrawal"), &mut events)
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(fx.balance(savings.id), Money::from_major(100));
        assert_eq!(fx.desk().transactions_for(savings.id).unwrap().len(), 1);
    }

    #[test]
    fn test_adashe_batch_skips_sundays() {
        let fx = Fixture::new();
        let adashe = fx.open(AccountType::Adashe);
        let mut events = EventStore::new();

        let result = fx
            .post(
                TransactionRequest::credit(adashe.id, Money::from_major(500), "Daily deposit").for_days(4),
                &mut events,
            )
            .unwrap();

        assert_eq!(result.transactions.len(), 4);
        assert_eq!(result.balance, Money::from_major(2_000));

        let weekdays: Vec<_> = result.transactions.iter().map(|t| t.recorded_at.weekday()).collect();
        assert_eq!(weekdays, vec![Weekday::Wed, Weekday::Tue, Weekday::Mon, Weekday::Sat]);

        let last = &result.transactions[3];
        assert_eq!(last.description, "Daily deposit (Day 4)");
        assert_eq!(last.reference, format!("{}-4", result.reference));
    }

    #[test]
    fn test_adashe_deposit_below_minimum() {
        let fx = Fixture::new();
        let adashe = fx.open(AccountType::Adashe);
        let err = fx
            .post(TransactionRequest::credit(adashe.id, Money::from_major(150), "Daily deposit"), &mut EventStore::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed { .. }));
        assert_eq!(fx.balance(adashe.id), Money::ZERO);
    }

    #[test]
    fn test_adashe_withdrawal_charges_commission() {
        let fx = Fixture::new();
        let adashe = fx.open(AccountType::Adashe);
        let mut events = EventStore::new();

        // deposits dated wed, tue, mon, sat: first deposit four days ago
        fx.post(
            TransactionRequest::credit(adashe.id, Money::from_major(600), "Daily deposit").for_days(4),
            &mut events,
        )
        .unwrap();

        // 2,400 over 4 days is 600 a day; 1,200 is 2 days at 0.1% a day
        let result = fx
            .post(TransactionRequest::debit(adashe.id, Money::from_major(1_200), "Withdrawal"), &mut events)
            .unwrap();

        let commission = result.commission.unwrap();
        assert_eq!(commission.amount, Money::from_str_exact("2.40").unwrap());
        assert_eq!(result.transactions.len(), 2);
        assert_eq!(result.transactions[1].description, "Adashe commission");
        assert_eq!(result.balance, Money::from_str_exact("1197.60").unwrap());

        let history: Money = fx.desk().transactions_for(adashe.id).unwrap().iter().map(|t| t.amount).sum();
        assert_eq!(history, result.balance);
        assert!(events.events().iter().any(|e| matches!(e, Event::CommissionAccrued { .. })));
    }

    #[test]
    fn test_adashe_withdrawal_needs_room_for_commission() {
        let fx = Fixture::new();
        let adashe = fx.open(AccountType::Adashe);
        let mut events = EventStore::new();
        fx.post(
            TransactionRequest::credit(adashe.id, Money::from_major(600), "Daily deposit").for_days(4),
            &mut events,
        )
        .unwrap();

        // 2,400 is 4 days of saving, so 9.60 commission on top
        let err = fx
            .post(TransactionRequest::debit(adashe.id, Money::from_major(2_400), "Withdrawal"), &mut events)
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(fx.balance(adashe.id), Money::from_major(2_400));
        let now = fx.time.now();
        let accrued = adashe::commissions_between(&fx.store.begin(), now - Duration::days(30), now + Duration::days(30));
        assert!(accrued.is_empty());
    }

    #[test]
    fn test_deposit_days_from_monday() {
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let days = deposit_days(monday, 3);
        let weekdays: Vec<_> = days.iter().map(|d| d.weekday()).collect();
        assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Sat, Weekday::Fri]);
    }
}
