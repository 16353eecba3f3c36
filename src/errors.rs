use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::AccountType;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("{account_type:?} account not found for {owner}")]
    AccountNotFound {
        account_type: AccountType,
        owner: Uuid,
    },

    #[error("validation failed: {}", violations.join("; "))]
    ValidationFailed {
        violations: Vec<String>,
    },

    #[error("insufficient collateral: available {available}, required {required}")]
    InsufficientCollateral {
        available: Money,
        required: Money,
    },

    #[error("insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: Money,
        required: Money,
    },

    #[error("customer {customer_id} already has a running loan")]
    DuplicateActiveLoan {
        customer_id: Uuid,
    },

    #[error("invalid state transition: current {current}, requested {requested}")]
    InvalidStateTransition {
        current: String,
        requested: String,
    },

    #[error("configuration missing: {what}")]
    ConfigurationMissing {
        what: String,
    },

    #[error("arithmetic precondition failed: {message}")]
    ArithmeticPrecondition {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl LedgerError {
    /// both lookup failures count as not-found for callers mapping error kinds
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. } | LedgerError::AccountNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
