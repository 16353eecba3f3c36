pub mod amortization;
pub mod liquidation;
pub mod waterfall;

use crate::decimal::Money;

pub use amortization::{AmortizationCalculator, InstallmentSplit, RepaymentSchedule, ScheduleTotals};
pub use liquidation::{ChargeDistribution, LiquidationEngine, PayoffQuote};
pub use waterfall::{RepaymentWaterfallProcessor, SweepFailure, SweepReport};

/// how one payment splits between interest-and-fees and principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentAllocation {
    pub interest_portion: Money,
    pub principal_portion: Money,
}

impl PaymentAllocation {
    pub fn total(&self) -> Money {
        self.interest_portion + self.principal_portion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_total() {
        let allocation = PaymentAllocation {
            interest_portion: Money::from_major(65),
            principal_portion: Money::from_major(235),
        };
        assert_eq!(allocation.total(), Money::from_major(300));
    }
}
