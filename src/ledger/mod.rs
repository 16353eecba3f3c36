pub mod posting;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::entities::{Account, Transaction};
use crate::store::UnitOfWork;

pub use posting::{AccountDesk, PostingResult};

/// reference shared by every ledger row an operation writes
pub fn new_reference(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TRX{}{}", now.format("%Y%m%d%H%M%S"), suffix[..6].to_uppercase())
}

/// single point of mutation for account balances
///
/// Every balance change is paired with an immutable [`Transaction`] staged in
/// the same unit of work, so both commit together or not at all. Sufficient
/// funds are the caller's concern.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionLedger;

impl TransactionLedger {
    /// append a transaction dated `at` and move the balance by `amount`
    pub fn record(
        uow: &mut UnitOfWork<'_>,
        account: &mut Account,
        description: &str,
        amount: Money,
        reference: &str,
        actor: Option<&str>,
        at: DateTime<Utc>,
    ) -> Transaction {
        account.balance += amount;
        if account.balance.is_negative() && account.account_type.requires_non_negative_balance() {
            tracing::warn!(
                account_id = %account.id,
                balance = %account.balance,
                "non-negative account driven below zero"
            );
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            account_id: account.id,
            amount,
            description: description.to_string(),
            reference: reference.to_string(),
            recorded_at: at,
            actor: actor.map(str::to_string),
        };

        tracing::debug!(
            account_id = %account.id,
            %amount,
            description,
            reference,
            "ledger entry recorded"
        );

        uow.save(account.clone());
        uow.save(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LedgerStore;
    use crate::types::AccountType;

    #[test]
    fn test_record_moves_balance_with_transaction() {
        let store = LedgerStore::new();
        let now = Utc::now();
        let mut account = Account::open(Uuid::new_v4(), AccountType::Savings, "Savings", now);
        let reference = new_reference(now);

        store
            .transaction(|uow| {
                TransactionLedger::record(uow, &mut account, "Deposit", Money::from_major(500), &reference, None, now);
                TransactionLedger::record(uow, &mut account, "Withdrawal", -Money::from_major(120), &reference, Some("teller"), now);
                Ok(())
            })
            .unwrap();

        let uow = store.begin();
        let stored = uow.find::<Account>(account.id).unwrap();
        assert_eq!(stored.balance, Money::from_major(380));

        let history = uow.transactions_for(account.id);
        assert_eq!(history.len(), 2);
        let total: Money = history.iter().map(|t| t.amount).sum();
        assert_eq!(total, stored.balance);
        assert!(history.iter().all(|t| t.reference == reference));
    }

    #[test]
    fn test_discarded_unit_leaves_balance_untouched() {
        let store = LedgerStore::new();
        let now = Utc::now();
        let account = Account::open(Uuid::new_v4(), AccountType::Savings, "Savings", now);
        let id = account.id;
        store.transaction(|uow| Ok(uow.save(account))).unwrap();

        {
            let mut uow = store.begin();
            let mut staged = uow.find::<Account>(id).unwrap();
            TransactionLedger::record(&mut uow, &mut staged, "Deposit", Money::from_major(10), "TRX", None, now);
        }

        let uow = store.begin();
        assert_eq!(uow.find::<Account>(id).unwrap().balance, Money::ZERO);
        assert!(uow.transactions_for(id).is_empty());
    }

    #[test]
    fn test_reference_shape() {
        let reference = new_reference(Utc::now());
        assert!(reference.starts_with("TRX"));
        assert_eq!(reference.len(), 3 + 14 + 6);
    }
}
