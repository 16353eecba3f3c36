//! Daily-deposit ("adashe") configuration and commission records.

pub mod commission;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::entities::{AdasheCommission, AdasheSetup};
use crate::errors::{LedgerError, Result};
use crate::store::UnitOfWork;

pub use commission::{AdasheCommissionCalculator, CommissionQuote};

/// current setup: the highest version wins
pub fn latest_setup(uow: &UnitOfWork<'_>) -> Result<AdasheSetup> {
    uow.find_where(|_: &AdasheSetup| true)
        .into_iter()
        .max_by_key(|s| s.version)
        .ok_or_else(|| LedgerError::ConfigurationMissing {
            what: "adashe setup".to_string(),
        })
}

fn check_setup(commission_rate: Rate, minimum_deposit: Money) -> Result<()> {
    let mut violations = Vec::new();
    if commission_rate.is_negative() {
        violations.push("commission_rate: cannot be negative".to_string());
    }
    if minimum_deposit.is_negative() {
        violations.push("minimum_deposit: cannot be negative".to_string());
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::ValidationFailed { violations })
    }
}

/// publish a new setup version on top of the current one
pub fn publish_setup(
    uow: &mut UnitOfWork<'_>,
    commission_rate: Rate,
    minimum_deposit: Money,
    at: DateTime<Utc>,
) -> Result<AdasheSetup> {
    check_setup(commission_rate, minimum_deposit)?;
    let version = match latest_setup(uow) {
        Ok(current) => current.version + 1,
        Err(LedgerError::ConfigurationMissing { .. }) => 1,
        Err(other) => return Err(other),
    };

    tracing::info!(version, %commission_rate, %minimum_deposit, "adashe setup published");
    Ok(uow.save(AdasheSetup {
        id: Uuid::new_v4(),
        version,
        commission_rate,
        minimum_deposit,
        created_at: at,
    }))
}

/// change rate and minimum of an existing version in place
pub fn update_setup(
    uow: &mut UnitOfWork<'_>,
    id: Uuid,
    commission_rate: Rate,
    minimum_deposit: Money,
) -> Result<AdasheSetup> {
    check_setup(commission_rate, minimum_deposit)?;
    let mut setup = uow.find::<AdasheSetup>(id)?;
    setup.commission_rate = commission_rate;
    setup.minimum_deposit = minimum_deposit;
    Ok(uow.save(setup))
}

/// commissions accrued within `[start, end]`, oldest first
pub fn commissions_between(
    uow: &UnitOfWork<'_>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<AdasheCommission> {
    let mut found = uow.find_where(|c: &AdasheCommission| c.accrued_on >= start && c.accrued_on <= end);
    found.sort_by_key(|c| c.accrued_on);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LedgerStore;
    use chrono::Duration;

    #[test]
    fn test_missing_setup() {
        let store = LedgerStore::new();
        let err = latest_setup(&store.begin()).unwrap_err();
        assert!(matches!(err, LedgerError::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_latest_version_wins() {
        let store = LedgerStore::new();
        let now = Utc::now();
        store
            .transaction(|uow| {
                publish_setup(uow, Rate::from_percentage(3), Money::from_major(200), now)?;
                publish_setup(uow, Rate::from_percentage(4), Money::from_major(500), now)
            })
            .unwrap();

        let current = latest_setup(&store.begin()).unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.minimum_deposit, Money::from_major(500));
    }

    #[test]
    fn test_update_in_place() {
        let store = LedgerStore::new();
        let first = store
            .transaction(|uow| publish_setup(uow, Rate::from_percentage(3), Money::from_major(200), Utc::now()))
            .unwrap();

        store
            .transaction(|uow| update_setup(uow, first.id, Rate::from_percentage(5), Money::from_major(100)))
            .unwrap();

        let current = latest_setup(&store.begin()).unwrap();
        assert_eq!(current.id, first.id);
        assert_eq!(current.version, 1);
        assert_eq!(current.commission_rate, Rate::from_percentage(5));

        let err = store
            .transaction(|uow| update_setup(uow, Uuid::new_v4(), Rate::ZERO, Money::ZERO))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_negative_minimum_rejected() {
        let store = LedgerStore::new();
        let err = store
            .transaction(|uow| publish_setup(uow, Rate::from_percentage(3), Money::from_major(-1), Utc::now()))
            .unwrap_err();
        assert!(matches!(err, LedgerError::ValidationFailed { .. }));
    }

    #[test]
    fn test_commissions_between() {
        let store = LedgerStore::new();
        let now = Utc::now();
        let account_id = Uuid::new_v4();
        store
            .transaction(|uow| {
                for days in [1, 10, 40] {
                    uow.save(AdasheCommission {
                        id: Uuid::new_v4(),
                        account_id,
                        amount: Money::from_major(days),
                        reference: format!("TRX{days}"),
                        accrued_on: now - Duration::days(days),
                    });
                }
                Ok(())
            })
            .unwrap();

        let found = commissions_between(&store.begin(), now - Duration::days(30), now);
        let amounts: Vec<_> = found.iter().map(|c| c.amount).collect();
        assert_eq!(amounts, vec![Money::from_major(10), Money::from_major(1)]);
    }
}
