//! Collateral deposit held against loan applications.

use chrono::{DateTime, Utc};

use crate::config::CollateralConfig;
use crate::decimal::{Money, Rate};
use crate::entities::Account;
use crate::errors::{LedgerError, Result};
use crate::ledger::TransactionLedger;
use crate::store::UnitOfWork;
use crate::types::{AccountType, CustomerId};

/// minimum collateral as a share of the requested amount
#[derive(Debug, Clone, Copy)]
pub struct CollateralRequirement {
    ratio: Rate,
}

impl CollateralRequirement {
    pub fn new(config: &CollateralConfig) -> Self {
        Self {
            ratio: config.required_ratio,
        }
    }

    pub fn required_for(&self, requested: Money) -> Money {
        requested.percentage(self.ratio)
    }

    /// the balance already held plus the new deposit must cover the requirement
    pub fn check(&self, held: Money, deposit: Money, requested: Money) -> Result<()> {
        let available = held + deposit;
        let required = self.required_for(requested);
        if available < required {
            return Err(LedgerError::InsufficientCollateral { available, required });
        }
        Ok(())
    }

    /// balance of the customer's collateral deposit account, zero when none exists
    pub fn held(&self, uow: &UnitOfWork<'_>, customer_id: CustomerId) -> Money {
        uow.account_of_type(customer_id, AccountType::CollateralDeposit)
            .map(|account| account.balance)
            .unwrap_or(Money::ZERO)
    }

    /// credit the deposit, opening the account on first use
    pub fn deposit(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        amount: Money,
        reference: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Account {
        let mut account = uow
            .account_of_type(customer_id, AccountType::CollateralDeposit)
            .unwrap_or_else(|| {
                Account::open(
                    customer_id,
                    AccountType::CollateralDeposit,
                    AccountType::CollateralDeposit.default_name(),
                    at,
                )
            });
        if amount.is_positive() {
            TransactionLedger::record(uow, &mut account, "Collateral deposit", amount, reference, Some(actor), at);
        } else {
            uow.save(account.clone());
        }
        account
    }
}
