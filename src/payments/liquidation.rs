use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::actor::Actor;
use crate::decimal::Money;
use crate::entities::{LoanApplication, LoanLiquidation, LoanRepayment};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::TransactionLedger;
use crate::requests::LiquidationRequest;
use crate::store::UnitOfWork;
use crate::types::{AccountStatus, AccountType, LoanStatus, RepaymentStatus};

/// how a liquidation charge landed on the schedule
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChargeDistribution {
    pub interest: Money,
    pub monitoring_fee: Money,
    pub processing_fee: Money,
    /// charge left after every row's fees were covered
    pub unallocated: Money,
}

impl ChargeDistribution {
    pub fn allocated(&self) -> Money {
        self.interest + self.monitoring_fee + self.processing_fee
    }
}

/// amount needed to settle a loan early
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffQuote {
    pub remaining_principal: Money,
    pub interest_charged: Money,
}

impl PayoffQuote {
    pub fn total(&self) -> Money {
        self.remaining_principal + self.interest_charged
    }
}

/// early settlement of a running loan
///
/// The borrower pays the outstanding principal plus an interest charge decided
/// outside the engine. The charge is laid over the open installments in
/// interest, monitoring fee, processing fee order; every open installment is
/// then settled and the loan account closed.
#[derive(Debug, Default, Clone)]
pub struct LiquidationEngine;

impl LiquidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// principal still owed over the given installments; an overpaid row counts as zero
    pub fn remaining_principal(&self, repayments: &[LoanRepayment]) -> Money {
        repayments.iter().map(LoanRepayment::remaining_principal).sum()
    }

    pub fn quote(&self, repayments: &[LoanRepayment], interest_charged: Money) -> PayoffQuote {
        PayoffQuote {
            remaining_principal: self.remaining_principal(repayments),
            interest_charged,
        }
    }

    /// lay the charge over the rows and settle each of them
    pub fn distribute_charge(&self, repayments: &mut [LoanRepayment], charge: Money) -> ChargeDistribution {
        let mut remaining = charge;
        let mut distribution = ChargeDistribution::default();

        for repayment in repayments.iter_mut() {
            let interest_paid = take(&mut repayment.interest, &mut remaining);
            let monitoring_paid = take(&mut repayment.monitoring_fee, &mut remaining);
            let processing_paid = take(&mut repayment.processing_fee, &mut remaining);

            distribution.interest += interest_paid;
            distribution.monitoring_fee += monitoring_paid;
            distribution.processing_fee += processing_paid;

            repayment.total_interest_paid = interest_paid + monitoring_paid + processing_paid;
            repayment.total_paid = repayment.total_interest_paid + repayment.principal;
            repayment.total = repayment.total_paid;
            repayment.total_due = Money::ZERO;
            repayment.status = RepaymentStatus::Paid;
        }

        distribution.unallocated = remaining;
        distribution
    }

    /// settle the application inside the caller's unit of work
    pub fn liquidate(
        &self,
        uow: &mut UnitOfWork<'_>,
        request: &LiquidationRequest,
        actor: &Actor,
        reference: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<LoanLiquidation> {
        let mut application = uow.find::<LoanApplication>(request.loan_id)?;
        if !application.status.can_transition_to(LoanStatus::PaidOff) {
            return Err(LedgerError::InvalidStateTransition {
                current: format!("{:?}", application.status),
                requested: format!("{:?}", LoanStatus::PaidOff),
            });
        }

        let mut repayments = uow.open_repayments_for(application.id);
        let quote = self.quote(&repayments, request.interest_charged);
        let total = quote.total();

        let mut savings = uow.require_account(application.customer_id, AccountType::Savings)?;
        let mut loan_account = uow.loan_account_for(application.id)?;

        if savings.balance < total {
            tracing::warn!(
                application_id = %application.id,
                available = %savings.balance,
                required = %total,
                "liquidation refused"
            );
            return Err(LedgerError::InsufficientBalance {
                available: savings.balance,
                required: total,
            });
        }

        TransactionLedger::record(uow, &mut savings, "Loan liquidation", -total, reference, Some(actor.username.as_str()), now);
        let outstanding = loan_account.balance;
        TransactionLedger::record(
            uow,
            &mut loan_account,
            "Loan liquidation",
            -outstanding,
            reference,
            Some(actor.username.as_str()),
            now,
        );
        loan_account.status = AccountStatus::Closed;
        uow.save(loan_account);

        application.status = application.status.transition(LoanStatus::PaidOff)?;
        let distribution = self.distribute_charge(&mut repayments, request.interest_charged);
        for repayment in repayments.iter_mut() {
            repayment.payment_date = Some(now);
        }
        uow.save_all(repayments);

        let liquidation = uow.save(LoanLiquidation {
            id: Uuid::new_v4(),
            application_id: application.id,
            user_id: actor.user_id,
            actor: actor.username.clone(),
            liquidation_reason: request.reason.clone(),
            amount: total,
            loan_amount: application.amount_approved.unwrap_or(application.amount),
            interest_amount: request.interest_charged,
            interest_paid_amount: distribution.allocated(),
            liquidated_at: now,
        });
        uow.save(application);

        tracing::info!(
            application_id = %liquidation.application_id,
            principal = %quote.remaining_principal,
            charge = %quote.interest_charged,
            unallocated = %distribution.unallocated,
            "loan liquidated"
        );
        events.emit(Event::LoanLiquidated {
            application_id: liquidation.application_id,
            liquidation_id: liquidation.id,
            amount: total,
            interest_charged: request.interest_charged,
            timestamp: now,
        });

        Ok(liquidation)
    }
}

/// pay `field` down from `remaining`; returns what was taken
fn take(field: &mut Money, remaining: &mut Money) -> Money {
    let paid = (*remaining).min(*field).floor_zero();
    *field -= paid;
    *remaining -= paid;
    paid
}
