use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::CommissionConfig;
use crate::decimal::{ceil_div, round_half_up, whole_days_between, Money, RATE_PRECISION};
use crate::entities::{AdasheCommission, AdasheSetup};
use crate::errors::{LedgerError, Result};
use crate::store::UnitOfWork;
use crate::types::AccountId;

/// result of a commission calculation for one debit
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionQuote {
    pub reference_date: DateTime<Utc>,
    pub days_elapsed: u32,
    pub deposits: Money,
    pub average_daily_savings: Decimal,
    /// days of saving the debit is worth
    pub commission_days: u32,
    /// percentage applied to the debit
    pub commission_rate: Decimal,
    pub commission: Money,
    pub accrued_on: DateTime<Utc>,
}

/// commission on debits from daily-deposit accounts
///
/// A debit is converted into the number of days of average saving it
/// represents; the setup rate is charged pro rata for those days.
#[derive(Debug, Clone)]
pub struct AdasheCommissionCalculator {
    rate_period_days: u32,
}

impl AdasheCommissionCalculator {
    pub fn new(config: &CommissionConfig) -> Self {
        Self {
            rate_period_days: config.rate_period_days,
        }
    }

    /// the last accrual date, or the first deposit when nothing accrued yet
    pub fn reference_date(&self, uow: &UnitOfWork<'_>, account_id: AccountId) -> Result<DateTime<Utc>> {
        let last_accrual = uow
            .find_where(|c: &AdasheCommission| c.account_id == account_id)
            .into_iter()
            .map(|c| c.accrued_on)
            .max();
        if let Some(date) = last_accrual {
            return Ok(date);
        }

        uow.transactions_for(account_id)
            .into_iter()
            .find(|t| t.amount.is_positive())
            .map(|t| t.recorded_at)
            .ok_or_else(|| LedgerError::ArithmeticPrecondition {
                message: format!("account {account_id} has no deposits"),
            })
    }

    /// positive postings on or after `since`
    pub fn deposits_since(&self, uow: &UnitOfWork<'_>, account_id: AccountId, since: DateTime<Utc>) -> Money {
        uow.transactions_for(account_id)
            .iter()
            .filter(|t| t.amount.is_positive() && t.recorded_at >= since)
            .map(|t| t.amount)
            .sum()
    }

    /// pure commission formula
    pub fn quote(
        &self,
        debit: Money,
        setup: &AdasheSetup,
        reference_date: DateTime<Utc>,
        deposits: Money,
        now: DateTime<Utc>,
    ) -> Result<CommissionQuote> {
        let days_elapsed = whole_days_between(reference_date, now);
        if days_elapsed == 0 {
            return Err(LedgerError::ArithmeticPrecondition {
                message: format!("no whole day elapsed since {reference_date}"),
            });
        }
        if self.rate_period_days == 0 {
            return Err(LedgerError::ArithmeticPrecondition {
                message: "commission rate period is zero days".to_string(),
            });
        }

        let average_daily_savings = round_half_up(deposits.as_decimal() / Decimal::from(days_elapsed), RATE_PRECISION);
        if average_daily_savings <= Decimal::ZERO {
            return Err(LedgerError::ArithmeticPrecondition {
                message: format!("average daily savings is {average_daily_savings}"),
            });
        }

        let commission_days = ceil_div(debit.as_decimal(), average_daily_savings)?;
        let commission_rate = round_half_up(
            setup.commission_rate.as_percentage() / Decimal::from(self.rate_period_days) * Decimal::from(commission_days),
            RATE_PRECISION,
        );
        let commission = Money::from_decimal(debit.as_decimal() * commission_rate / Decimal::ONE_HUNDRED);

        Ok(CommissionQuote {
            reference_date,
            days_elapsed,
            deposits,
            average_daily_savings,
            commission_days,
            commission_rate,
            commission,
            accrued_on: reference_date + Duration::days(i64::from(commission_days)),
        })
    }

    /// quote a debit against the account's deposit history
    pub fn calculate(
        &self,
        uow: &UnitOfWork<'_>,
        account_id: AccountId,
        debit: Money,
        setup: &AdasheSetup,
        now: DateTime<Utc>,
    ) -> Result<CommissionQuote> {
        let reference_date = self.reference_date(uow, account_id)?;
        let deposits = self.deposits_since(uow, account_id, reference_date);
        self.quote(debit, setup, reference_date, deposits, now)
    }

    /// stage the accrual record for a quote
    pub fn accrue(
        &self,
        uow: &mut UnitOfWork<'_>,
        account_id: AccountId,
        quote: &CommissionQuote,
        reference: &str,
    ) -> AdasheCommission {
        tracing::info!(
            %account_id,
            commission = %quote.commission,
            commission_days = quote.commission_days,
            "adashe commission accrued"
        );
        uow.save(AdasheCommission {
            id: Uuid::new_v4(),
            account_id,
            amount: quote.commission,
            reference: reference.to_string(),
            accrued_on: quote.accrued_on,
        })
    }
}
