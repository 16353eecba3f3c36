use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{AccountId, ApplicationId, CustomerId, RejectionType, RepaymentId};

/// all events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // application events
    ApplicationSubmitted {
        application_id: ApplicationId,
        customer_id: CustomerId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    CollateralDeposited {
        account_id: AccountId,
        amount: Money,
        new_balance: Money,
        timestamp: DateTime<Utc>,
    },
    ApplicationApproved {
        application_id: ApplicationId,
        amount_approved: Money,
        tenor_approved: u32,
        timestamp: DateTime<Utc>,
    },
    ApplicationRejected {
        application_id: ApplicationId,
        rejection_type: RejectionType,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    LoanDisbursed {
        application_id: ApplicationId,
        amount: Money,
        total_repayable: Money,
        installments: u32,
        maturity: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    // collection events
    InstallmentCollected {
        application_id: ApplicationId,
        repayment_id: RepaymentId,
        amount: Money,
        applied_to_interest: Money,
        applied_to_principal: Money,
        remaining_due: Money,
        timestamp: DateTime<Utc>,
    },
    InstallmentDefaulted {
        application_id: ApplicationId,
        repayment_id: RepaymentId,
        amount_due: Money,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },
    LoanDue {
        application_id: ApplicationId,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },
    LoanPaidOff {
        application_id: ApplicationId,
        timestamp: DateTime<Utc>,
    },
    LoanLiquidated {
        application_id: ApplicationId,
        liquidation_id: Uuid,
        amount: Money,
        interest_charged: Money,
        timestamp: DateTime<Utc>,
    },

    // adashe events
    CommissionAccrued {
        account_id: AccountId,
        amount: Money,
        commission_days: u32,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// move every event from `other` into this store
    pub fn absorb(&mut self, other: &mut EventStore) {
        self.events.append(&mut other.events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_and_take() {
        let mut shared = EventStore::new();
        let mut local = EventStore::new();
        local.emit(Event::LoanPaidOff {
            application_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });

        shared.absorb(&mut local);
        assert!(local.events().is_empty());
        assert_eq!(shared.events().len(), 1);

        let taken = shared.take_events();
        assert_eq!(taken.len(), 1);
        assert!(shared.events().is_empty());
    }
}
