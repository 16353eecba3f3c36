use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};

pub type CustomerId = Uuid;
pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type ProductId = Uuid;
pub type ApplicationId = Uuid;
pub type AccountId = Uuid;
pub type RepaymentId = Uuid;

/// loan application status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// submitted, awaiting a decision
    Pending,
    /// approved, awaiting disbursement
    Approved,
    /// disbursed and performing
    Active,
    /// loan maturity passed with installments in default
    Due,
    /// fully repaid or liquidated
    PaidOff,
    /// temporarily declined
    Rejected,
    /// permanently declined
    Blocked,
}

impl LoanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::PaidOff | LoanStatus::Rejected | LoanStatus::Blocked)
    }

    /// loan has been disbursed and not yet settled
    pub fn is_running(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Due)
    }

    pub fn can_transition_to(self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Blocked)
                | (Approved, Active)
                | (Approved, Rejected)
                | (Approved, Blocked)
                | (Active, Due)
                | (Active, PaidOff)
                | (Due, Due)
                | (Due, PaidOff)
        )
    }

    /// checked transition
    pub fn transition(self, next: LoanStatus) -> Result<LoanStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LedgerError::InvalidStateTransition {
                current: format!("{self:?}"),
                requested: format!("{next:?}"),
            })
        }
    }
}

/// account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    /// daily-deposit savings that pays a commission on withdrawal
    Adashe,
    Loan,
    CollateralDeposit,
}

impl AccountType {
    /// customer-facing accounts that can be opened on request
    pub fn is_customer_opened(self) -> bool {
        match self {
            AccountType::Savings | AccountType::Adashe => true,
            AccountType::Loan | AccountType::CollateralDeposit => false,
        }
    }

    /// balance must never go below zero
    pub fn requires_non_negative_balance(self) -> bool {
        match self {
            AccountType::Loan | AccountType::CollateralDeposit => true,
            AccountType::Savings | AccountType::Adashe => false,
        }
    }

    /// manual postings allowed against the account
    pub fn accepts_manual_postings(self) -> bool {
        match self {
            AccountType::Savings | AccountType::Adashe | AccountType::CollateralDeposit => true,
            AccountType::Loan => false,
        }
    }

    pub fn default_name(self) -> &'static str {
        match self {
            AccountType::Savings => "Savings",
            AccountType::Adashe => "Adashe",
            AccountType::Loan => "Loan",
            AccountType::CollateralDeposit => "Collateral Deposit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Closed,
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentStatus {
    Pending,
    Paid,
    Default,
}

impl RepaymentStatus {
    /// still owed; eligible for collection and liquidation
    pub fn is_open(self) -> bool {
        matches!(self, RepaymentStatus::Pending | RepaymentStatus::Default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    Temporary,
    Permanent,
}

impl RejectionType {
    pub fn resulting_status(self) -> LoanStatus {
        match self {
            RejectionType::Temporary => LoanStatus::Rejected,
            RejectionType::Permanent => LoanStatus::Blocked,
        }
    }
}

/// direction of a manual posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Approved));
        assert!(LoanStatus::Approved.can_transition_to(LoanStatus::Active));
        assert!(LoanStatus::Active.can_transition_to(LoanStatus::PaidOff));
        assert!(LoanStatus::Active.can_transition_to(LoanStatus::Due));
        assert!(LoanStatus::Due.can_transition_to(LoanStatus::PaidOff));

        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Active));
        assert!(!LoanStatus::Active.can_transition_to(LoanStatus::Rejected));
        assert!(!LoanStatus::PaidOff.can_transition_to(LoanStatus::PaidOff));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [LoanStatus::PaidOff, LoanStatus::Rejected, LoanStatus::Blocked] {
            assert!(terminal.is_terminal());
            let err = terminal.transition(LoanStatus::Approved).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        }
    }

    #[test]
    fn test_rejection_type_status() {
        assert_eq!(RejectionType::Temporary.resulting_status(), LoanStatus::Rejected);
        assert_eq!(RejectionType::Permanent.resulting_status(), LoanStatus::Blocked);
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&LoanStatus::PaidOff).unwrap();
        assert_eq!(json, "\"PAID_OFF\"");
        let account: AccountType = serde_json::from_str("\"COLLATERAL_DEPOSIT\"").unwrap();
        assert_eq!(account, AccountType::CollateralDeposit);
    }
}
