use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{AccountId, ApplicationId, CustomerId, GroupId, ProductId, RejectionType, TransactionType, UserId};

/// single failed field constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// field constraints of an incoming request; empty means valid
pub trait Validate {
    fn validate(&self) -> Vec<Violation>;
}

/// reject the request when any constraint fails
pub fn validate_request<T: Validate + fmt::Debug>(request: &T) -> Result<()> {
    let violations = request.validate();
    if violations.is_empty() {
        return Ok(());
    }
    tracing::error!(?request, count = violations.len(), "request validation failed");
    Err(LedgerError::ValidationFailed {
        violations: violations.iter().map(Violation::to_string).collect(),
    })
}

fn positive(field: &'static str, amount: Money, violations: &mut Vec<Violation>) {
    if !amount.is_positive() {
        violations.push(Violation::new(field, "must be greater than zero"));
    }
}

fn non_negative(field: &'static str, amount: Money, violations: &mut Vec<Violation>) {
    if amount.is_negative() {
        violations.push(Violation::new(field, "cannot be negative"));
    }
}

fn not_blank(field: &'static str, value: &str, violations: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        violations.push(Violation::new(field, "required"));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplicationRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub applied_by: UserId,
    pub group_id: Option<GroupId>,
    pub amount: Money,
    pub tenor: u32,
    pub collateral_deposit: Money,
    pub search_fee: Money,
    pub forms_fee: Money,
}

impl Validate for LoanApplicationRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        positive("amount", self.amount, &mut violations);
        if self.tenor == 0 {
            violations.push(Violation::new("tenor", "must be at least one unit"));
        }
        non_negative("collateral_deposit", self.collateral_deposit, &mut violations);
        non_negative("search_fee", self.search_fee, &mut violations);
        non_negative("forms_fee", self.forms_fee, &mut violations);
        violations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub loan_id: ApplicationId,
    pub approver_id: UserId,
    pub amount_approved: Money,
    pub tenor_approved: u32,
}

impl Validate for ApprovalRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        positive("amount_approved", self.amount_approved, &mut violations);
        if self.tenor_approved == 0 {
            violations.push(Violation::new("tenor_approved", "must be at least one unit"));
        }
        violations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    pub loan_id: ApplicationId,
    pub reason: String,
    /// interest component of the payoff, decided outside the engine
    pub interest_charged: Money,
}

impl Validate for LiquidationRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        not_blank("reason", &self.reason, &mut violations);
        non_negative("interest_charged", self.interest_charged, &mut violations);
        violations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRequest {
    pub loan_id: ApplicationId,
    pub reason: String,
    pub rejection_type: RejectionType,
}

impl Validate for RejectionRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        not_blank("reason", &self.reason, &mut violations);
        violations
    }
}

/// manual credit or debit against a customer account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub account_id: AccountId,
    pub user_id: Option<UserId>,
    pub amount: Money,
    pub description: String,
    pub transaction_type: TransactionType,
    /// adashe credits: number of daily deposits covered; zero counts as one
    pub days: u32,
}

impl TransactionRequest {
    pub fn credit(account_id: AccountId, amount: Money, description: impl Into<String>) -> Self {
        Self {
            account_id,
            user_id: None,
            amount,
            description: description.into(),
            transaction_type: TransactionType::Credit,
            days: 1,
        }
    }

    pub fn debit(account_id: AccountId, amount: Money, description: impl Into<String>) -> Self {
        Self {
            transaction_type: TransactionType::Debit,
            ..Self::credit(account_id, amount, description)
        }
    }

    pub fn for_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn day_count(&self) -> u32 {
        self.days.max(1)
    }
}

impl Validate for TransactionRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        positive("amount", self.amount, &mut violations);
        not_blank("description", &self.description, &mut violations);
        violations
    }
}
