use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::decimal::{divide_to_money, rate_over_tenor, Money};
use crate::entities::{LoanProduct, LoanRepayment};
use crate::errors::{LedgerError, Result};
use crate::types::{ApplicationId, RepaymentStatus};

/// undivided charges over the whole tenor, before any rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleTotals {
    pub interest: Decimal,
    pub monitoring_fee: Decimal,
    pub processing_fee: Decimal,
    pub principal: Decimal,
}

impl ScheduleTotals {
    pub fn total(&self) -> Decimal {
        self.interest + self.monitoring_fee + self.processing_fee + self.principal
    }
}

/// per-installment split; every field rounded independently
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstallmentSplit {
    pub interest: Money,
    pub monitoring_fee: Money,
    pub processing_fee: Money,
    pub principal: Money,
}

impl InstallmentSplit {
    /// sum of the rounded parts
    pub fn total(&self) -> Money {
        self.interest + self.monitoring_fee + self.processing_fee + self.principal
    }
}

/// repayment schedule for one loan
#[derive(Debug, Clone)]
pub struct RepaymentSchedule {
    pub application_id: ApplicationId,
    pub totals: ScheduleTotals,
    pub split: InstallmentSplit,
    pub installments: Vec<LoanRepayment>,
    pub start_date: DateTime<Utc>,
}

impl RepaymentSchedule {
    pub fn installment_count(&self) -> u32 {
        self.installments.len() as u32
    }

    /// sum of installment totals; this is what the borrower repays
    pub fn total_repayable(&self) -> Money {
        self.installments.iter().map(|r| r.total).sum()
    }

    /// difference between the rounded schedule and the undivided totals
    pub fn rounding_drift(&self) -> Decimal {
        self.total_repayable().as_decimal() - self.totals.total()
    }

    /// maturity of the final installment
    pub fn maturity(&self) -> DateTime<Utc> {
        self.installments
            .last()
            .map(|r| r.maturity_date)
            .unwrap_or(self.start_date)
    }
}

/// flat-rate schedule calculator
///
/// Interest and both fees are charged on the full approved amount for every
/// tenor unit, then spread evenly across `tenor × installments_per_unit`
/// installments. Each component is rounded on its own, so the schedule total
/// may differ from the undivided totals by a few cents; that drift is kept.
#[derive(Debug, Clone)]
pub struct AmortizationCalculator {
    installments_per_unit: u32,
    period_days: u32,
    max_installments: u32,
    rate_precision: u32,
}

impl AmortizationCalculator {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            installments_per_unit: config.installments_per_tenor_unit,
            period_days: config.installment_period_days,
            max_installments: config.max_installments,
            rate_precision: config.rate_precision,
        }
    }

    /// installments for a tenor, bounded by the configured maximum
    pub fn installment_count(&self, tenor: u32) -> Result<u32> {
        tenor
            .checked_mul(self.installments_per_unit)
            .filter(|count| *count <= self.max_installments)
            .ok_or_else(|| LedgerError::ValidationFailed {
                violations: vec![format!(
                    "tenor_approved: {tenor} units exceeds the maximum of {} installments",
                    self.max_installments
                )],
            })
    }

    /// undivided interest and fee totals for the tenor
    pub fn totals(&self, amount: Money, tenor: u32, product: &LoanProduct) -> ScheduleTotals {
        ScheduleTotals {
            interest: rate_over_tenor(amount, product.interest_rate, tenor, self.rate_precision),
            monitoring_fee: rate_over_tenor(amount, product.monitoring_fee_rate, tenor, self.rate_precision),
            processing_fee: rate_over_tenor(amount, product.processing_fee_rate, tenor, self.rate_precision),
            principal: amount.as_decimal(),
        }
    }

    /// split the totals into `installments` equal rounded shares
    pub fn split(&self, totals: &ScheduleTotals, installments: u32) -> Result<InstallmentSplit> {
        Ok(InstallmentSplit {
            interest: divide_to_money(totals.interest, installments)?,
            monitoring_fee: divide_to_money(totals.monitoring_fee, installments)?,
            processing_fee: divide_to_money(totals.processing_fee, installments)?,
            principal: divide_to_money(totals.principal, installments)?,
        })
    }

    /// generate the schedule; the first installment matures one period after `start_date`
    pub fn generate(
        &self,
        application_id: ApplicationId,
        amount: Money,
        tenor: u32,
        product: &LoanProduct,
        start_date: DateTime<Utc>,
    ) -> Result<RepaymentSchedule> {
        if !amount.is_positive() {
            return Err(LedgerError::ValidationFailed {
                violations: vec![format!("amount_approved: must be greater than zero, got {amount}")],
            });
        }
        if tenor == 0 {
            return Err(LedgerError::ValidationFailed {
                violations: vec!["tenor_approved: must be at least one unit".to_string()],
            });
        }

        let count = self.installment_count(tenor)?;
        let totals = self.totals(amount, tenor, product);
        let split = self.split(&totals, count)?;
        let total = split.total();

        let mut installments = Vec::with_capacity(count as usize);
        for number in 1..=count {
            let maturity_date = Duration::try_days(i64::from(self.period_days) * i64::from(number))
                .and_then(|offset| start_date.checked_add_signed(offset))
                .ok_or_else(|| LedgerError::ArithmeticPrecondition {
                    message: format!("installment {number} matures beyond the supported date range"),
                })?;
            installments.push(LoanRepayment {
                id: Uuid::new_v4(),
                application_id,
                installment_number: number,
                interest: split.interest,
                monitoring_fee: split.monitoring_fee,
                processing_fee: split.processing_fee,
                principal: split.principal,
                total,
                total_paid: Money::ZERO,
                total_due: total,
                total_interest_paid: Money::ZERO,
                status: RepaymentStatus::Pending,
                maturity_date,
                payment_date: None,
                days_overdue: 0,
            });
        }

        Ok(RepaymentSchedule {
            application_id,
            totals,
            split,
            installments,
            start_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::decimal::Rate;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn calculator() -> AmortizationCalculator {
        AmortizationCalculator::new(&EngineConfig::default().schedule)
    }

    fn product(interest: Decimal, monitoring: Decimal, processing: Decimal) -> LoanProduct {
        LoanProduct::new(
            "Micro",
            Rate::from_percentage_decimal(interest),
            Rate::from_percentage_decimal(monitoring),
            Rate::from_percentage_decimal(processing),
        )
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_single_unit_weekly_schedule() {
        let schedule = calculator()
            .generate(Uuid::new_v4(), Money::from_major(10_000), 1, &product(dec!(2), dec!(0), dec!(0)), start())
            .unwrap();

        assert_eq!(schedule.totals.interest, dec!(200));
        assert_eq!(schedule.installment_count(), 4);
        for row in &schedule.installments {
            assert_eq!(row.interest, Money::from_major(50));
            assert_eq!(row.principal, Money::from_major(2_500));
            assert_eq!(row.total, Money::from_major(2_550));
            assert_eq!(row.total_due, row.total);
            assert_eq!(row.status, RepaymentStatus::Pending);
        }
        assert_eq!(schedule.total_repayable(), Money::from_major(10_200));
    }

    #[test]
    fn test_maturities_advance_weekly() {
        let schedule = calculator()
            .generate(Uuid::new_v4(), Money::from_major(4_000), 2, &product(dec!(3), dec!(1), dec!(0.5)), start())
            .unwrap();

        assert_eq!(schedule.installment_count(), 8);
        for (i, row) in schedule.installments.iter().enumerate() {
            assert_eq!(row.installment_number, i as u32 + 1);
            assert_eq!(row.maturity_date, start() + Duration::days(7 * (i as i64 + 1)));
        }
        assert_eq!(schedule.maturity(), start() + Duration::weeks(8));
    }

    #[test]
    fn test_components_round_half_up_independently() {
        // 3.33% of 1,000 over 4 installments: 8.325 per installment
        let schedule = calculator()
            .generate(Uuid::new_v4(), Money::from_major(1_000), 1, &product(dec!(3.33), dec!(0), dec!(0)), start())
            .unwrap();

        assert_eq!(schedule.split.interest, Money::from_str_exact("8.33").unwrap());
        assert_eq!(schedule.total_repayable(), Money::from_str_exact("1033.32").unwrap());
        assert_eq!(schedule.rounding_drift(), dec!(0.02));
    }

    #[test]
    fn test_rounding_drift_is_bounded() {
        let schedule = calculator()
            .generate(Uuid::new_v4(), Money::from_major(10_000), 3, &product(dec!(2.5), dec!(1), dec!(0.5)), start())
            .unwrap();

        let split = &schedule.split;
        assert_eq!(split.interest, Money::from_str_exact("62.50").unwrap());
        assert_eq!(split.monitoring_fee, Money::from_major(25));
        assert_eq!(split.processing_fee, Money::from_str_exact("12.50").unwrap());
        assert_eq!(split.principal, Money::from_str_exact("833.33").unwrap());

        let summed: Money = schedule
            .installments
            .iter()
            .map(|r| r.interest + r.monitoring_fee + r.processing_fee + r.principal)
            .sum();
        assert_eq!(summed, schedule.total_repayable());

        let bound = dec!(0.01) * Decimal::from(schedule.installment_count());
        assert!(schedule.rounding_drift().abs() <= bound);
        assert_eq!(schedule.rounding_drift(), dec!(-0.04));
    }

    #[test]
    fn test_rejects_empty_terms() {
        let product = product(dec!(2), dec!(0), dec!(0));
        assert!(calculator().generate(Uuid::new_v4(), Money::ZERO, 1, &product, start()).is_err());
        assert!(calculator().generate(Uuid::new_v4(), Money::from_major(100), 0, &product, start()).is_err());
    }

    #[test]
    fn test_oversized_tenor_is_refused() {
        let product = product(dec!(2), dec!(0), dec!(0));
        for tenor in [131, 1 << 30, u32::MAX] {
            let err = calculator()
                .generate(Uuid::new_v4(), Money::from_major(100), tenor, &product, start())
                .unwrap_err();
            assert!(matches!(err, LedgerError::ValidationFailed { .. }));
        }

        // 130 units of 4 weekly installments is the longest schedule allowed
        let schedule = calculator()
            .generate(Uuid::new_v4(), Money::from_major(100), 130, &product, start())
            .unwrap();
        assert_eq!(schedule.installment_count(), 520);
    }

    #[test]
    fn test_maturity_past_date_range_is_an_error() {
        let product = product(dec!(2), dec!(0), dec!(0));
        let near_end = DateTime::<Utc>::MAX_UTC - Duration::days(10);

        let err = calculator()
            .generate(Uuid::new_v4(), Money::from_major(100), 1, &product, near_end)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticPrecondition { .. }));
    }
}
