//! Ledger entities.
//!
//! Relations are held as identifiers and resolved through the store; no entity
//! keeps a live reference to another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::types::{
    AccountId, AccountStatus, AccountType, ApplicationId, CustomerId, GroupId, LoanStatus, ProductId,
    RejectionType, RepaymentId, RepaymentStatus, UserId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone_number: None,
            created_at,
        }
    }
}

/// staff member acting on applications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
        }
    }
}

/// lending group; members are counted, not referenced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub number_of_members: u32,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            number_of_members: 0,
        }
    }
}

/// loan product; every rate is a percentage charged per tenor unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanProduct {
    pub id: ProductId,
    pub name: String,
    pub interest_rate: Rate,
    pub monitoring_fee_rate: Rate,
    pub processing_fee_rate: Rate,
}

impl LoanProduct {
    pub fn new(
        name: impl Into<String>,
        interest_rate: Rate,
        monitoring_fee_rate: Rate,
        processing_fee_rate: Rate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            interest_rate,
            monitoring_fee_rate,
            processing_fee_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub group_id: Option<GroupId>,

    // request
    pub amount: Money,
    pub tenor: u32,
    pub collateral_deposit: Money,
    pub search_fee: Money,
    pub forms_fee: Money,

    // decision, set only on approval
    pub amount_approved: Option<Money>,
    pub tenor_approved: Option<u32>,

    pub status: LoanStatus,
    pub days_overdue: u32,

    pub applied_by: UserId,
    pub approved_by: Option<UserId>,
    pub disbursed_by: Option<UserId>,

    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub maturity: Option<DateTime<Utc>>,
}

impl LoanApplication {
    /// approved amount and tenor, present once approved
    pub fn approved_terms(&self) -> Option<(Money, u32)> {
        self.amount_approved.zip(self.tenor_approved)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub account_number: String,
    pub name: String,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub balance: Money,
    pub loan_cycle: u32,
    /// originating loan for LOAN accounts
    pub loan_id: Option<ApplicationId>,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    /// new active account with zero balance; funds arrive through the ledger
    pub fn open(
        customer_id: CustomerId,
        account_type: AccountType,
        name: impl Into<String>,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            customer_id,
            account_number: account_number_for(id),
            name: name.into(),
            account_type,
            status: AccountStatus::Active,
            balance: Money::ZERO,
            loan_cycle: 0,
            loan_id: None,
            opened_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// ten digit account number, always starting with 2
fn account_number_for(id: Uuid) -> String {
    format!("2{:09}", id.as_u128() % 1_000_000_000)
}

/// one scheduled installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: RepaymentId,
    pub application_id: ApplicationId,
    pub installment_number: u32,
    pub interest: Money,
    pub monitoring_fee: Money,
    pub processing_fee: Money,
    pub principal: Money,
    pub total: Money,
    pub total_paid: Money,
    pub total_due: Money,
    pub total_interest_paid: Money,
    pub status: RepaymentStatus,
    pub maturity_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub days_overdue: u32,
}

impl LoanRepayment {
    /// interest and fees scheduled on the installment
    pub fn interest_obligation(&self) -> Money {
        self.interest + self.monitoring_fee + self.processing_fee
    }

    /// interest and fees still owed, never negative
    pub fn remaining_interest_obligation(&self) -> Money {
        (self.interest_obligation() - self.total_interest_paid).floor_zero()
    }

    /// principal still owed, never negative
    pub fn remaining_principal(&self) -> Money {
        (self.principal - (self.total_paid - self.total_interest_paid)).floor_zero()
    }
}

/// closure record for an early payoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanLiquidation {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub user_id: Option<UserId>,
    pub actor: String,
    pub liquidation_reason: String,
    /// amount taken from savings
    pub amount: Money,
    /// approved loan amount
    pub loan_amount: Money,
    /// interest charge supplied for the payoff
    pub interest_amount: Money,
    /// part of the charge allocated to scheduled interest and fees
    pub interest_paid_amount: Money,
    pub liquidated_at: DateTime<Utc>,
}

/// immutable ledger entry; positive credits, negative debits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: AccountId,
    pub amount: Money,
    pub description: String,
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
    pub actor: Option<String>,
}

/// commission configuration; the highest version is current
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdasheSetup {
    pub id: Uuid,
    pub version: u32,
    /// percentage charged per commission rate period
    pub commission_rate: Rate,
    pub minimum_deposit: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdasheCommission {
    pub id: Uuid,
    pub account_id: AccountId,
    pub amount: Money,
    pub reference: String,
    pub accrued_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub reason: String,
    pub rejection_type: RejectionType,
    pub user_id: Option<UserId>,
    pub actor: String,
    pub rejected_at: DateTime<Utc>,
}
