use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;

use crate::decimal::{whole_days_between, Money};
use crate::entities::{Account, LoanApplication, LoanRepayment};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{new_reference, TransactionLedger};
use crate::store::{LedgerStore, UnitOfWork};
use crate::types::{AccountStatus, AccountType, CustomerId, LoanStatus, RepaymentId, RepaymentStatus};

use super::PaymentAllocation;

/// customer whose due installments could not be processed
#[derive(Debug)]
pub struct SweepFailure {
    pub customer_id: Option<CustomerId>,
    pub repayment_ids: Vec<RepaymentId>,
    pub error: LedgerError,
}

/// outcome of one collection sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub reference: String,
    /// installments touched by committed customer units
    pub repayments: Vec<LoanRepayment>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn collected(&self) -> Vec<&LoanRepayment> {
        self.repayments
            .iter()
            .filter(|r| r.status != RepaymentStatus::Default)
            .collect()
    }

    pub fn defaulted(&self) -> Vec<&LoanRepayment> {
        self.repayments
            .iter()
            .filter(|r| r.status == RepaymentStatus::Default)
            .collect()
    }
}

/// collects due installments from savings, interest and fees first
#[derive(Debug, Default, Clone)]
pub struct RepaymentWaterfallProcessor;

impl RepaymentWaterfallProcessor {
    pub fn new() -> Self {
        Self
    }

    /// split a payment: outstanding interest and fees first, the rest to principal
    pub fn allocate(&self, repayment: &LoanRepayment, payment: Money) -> PaymentAllocation {
        let interest_portion = payment.min(repayment.remaining_interest_obligation());
        PaymentAllocation {
            interest_portion,
            principal_portion: payment - interest_portion,
        }
    }

    /// apply a payment to the installment and move it through the ledger
    #[allow(clippy::too_many_arguments)]
    pub fn apply_payment(
        &self,
        uow: &mut UnitOfWork<'_>,
        repayment: &mut LoanRepayment,
        savings: &mut Account,
        loan_account: &mut Account,
        payment: Money,
        reference: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> PaymentAllocation {
        let allocation = self.allocate(repayment, payment);

        repayment.total_paid += payment;
        repayment.total_interest_paid += allocation.interest_portion;
        repayment.total_due = repayment.total - repayment.total_paid;

        TransactionLedger::record(uow, savings, "Loan repayment", -payment, reference, None, now);
        TransactionLedger::record(uow, loan_account, "Loan principal repayment", -payment, reference, None, now);

        if !repayment.total_due.is_positive() {
            repayment.status = RepaymentStatus::Paid;
            repayment.payment_date = Some(now);
        }

        events.emit(Event::InstallmentCollected {
            application_id: repayment.application_id,
            repayment_id: repayment.id,
            amount: payment,
            applied_to_interest: allocation.interest_portion,
            applied_to_principal: allocation.principal_portion,
            remaining_due: repayment.total_due,
            timestamp: now,
        });

        allocation
    }

    /// flag a shortfall; the loan turns DUE once its own maturity has passed
    pub fn mark_default(
        &self,
        repayment: &mut LoanRepayment,
        application: &mut LoanApplication,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<()> {
        repayment.status = RepaymentStatus::Default;
        repayment.days_overdue = whole_days_between(repayment.maturity_date, now);

        events.emit(Event::InstallmentDefaulted {
            application_id: repayment.application_id,
            repayment_id: repayment.id,
            amount_due: repayment.total_due,
            days_overdue: repayment.days_overdue,
            timestamp: now,
        });

        if let Some(maturity) = application.maturity {
            if maturity < now && application.status.is_running() {
                application.status = application.status.transition(LoanStatus::Due)?;
                application.days_overdue = whole_days_between(maturity, now);
                events.emit(Event::LoanDue {
                    application_id: application.id,
                    days_overdue: application.days_overdue,
                    timestamp: now,
                });
            }
        }
        Ok(())
    }

    /// collect one installment inside the caller's unit of work
    pub fn collect(
        &self,
        uow: &mut UnitOfWork<'_>,
        repayment_id: RepaymentId,
        reference: &str,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) -> Result<LoanRepayment> {
        let mut repayment = uow.find::<LoanRepayment>(repayment_id)?;
        let mut application = uow.find::<LoanApplication>(repayment.application_id)?;
        let mut savings = uow.require_account(application.customer_id, AccountType::Savings)?;
        let mut loan_account = uow.loan_account_for(application.id)?;

        let payment = savings.balance.min(repayment.total_due);
        if !payment.is_positive() {
            tracing::warn!(
                application_id = %application.id,
                installment = repayment.installment_number,
                due = %repayment.total_due,
                "installment defaulted"
            );
            self.mark_default(&mut repayment, &mut application, now, events)?;
            uow.save(application);
            return Ok(repayment);
        }

        self.apply_payment(
            uow,
            &mut repayment,
            &mut savings,
            &mut loan_account,
            payment,
            reference,
            now,
            events,
        );

        if !loan_account.balance.is_positive() {
            loan_account.status = AccountStatus::Closed;
            uow.save(loan_account);
            application.status = application.status.transition(LoanStatus::PaidOff)?;
            uow.save(application.clone());
            tracing::info!(application_id = %application.id, "loan paid off");
            events.emit(Event::LoanPaidOff {
                application_id: application.id,
                timestamp: now,
            });
        }

        Ok(repayment)
    }

    /// run every due installment; each customer is one unit of work under its own lock
    pub fn sweep(&self, store: &LedgerStore, time_provider: &SafeTimeProvider, events: &mut EventStore) -> SweepReport {
        let now = time_provider.now();
        let mut report = SweepReport {
            reference: new_reference(now),
            ..SweepReport::default()
        };

        let due = store.begin().due_repayments(now);
        let mut by_customer: BTreeMap<CustomerId, Vec<LoanRepayment>> = BTreeMap::new();
        for repayment in due {
            match store.begin().find::<LoanApplication>(repayment.application_id) {
                Ok(application) => by_customer.entry(application.customer_id).or_default().push(repayment),
                Err(error) => report.failures.push(SweepFailure {
                    customer_id: None,
                    repayment_ids: vec![repayment.id],
                    error,
                }),
            }
        }

        tracing::info!(customers = by_customer.len(), reference = %report.reference, "repayment sweep started");

        for (customer_id, repayments) in by_customer {
            let mut keys = vec![customer_id];
            keys.extend(repayments.iter().map(|r| r.application_id));
            let _guard = store.lock(&keys);

            let mut local = EventStore::new();
            let outcome = store.transaction(|uow| {
                let mut touched = Vec::with_capacity(repayments.len());
                for repayment in &repayments {
                    // an earlier sweep may have settled it while we waited for the lock
                    let current = uow.find::<LoanRepayment>(repayment.id)?;
                    if !current.status.is_open() {
                        continue;
                    }
                    touched.push(self.collect(uow, repayment.id, &report.reference, now, &mut local)?);
                }
                Ok(uow.save_all(touched))
            });

            match outcome {
                Ok(touched) => {
                    events.absorb(&mut local);
                    report.repayments.extend(touched);
                }
                Err(error) => {
                    tracing::error!(%customer_id, %error, "repayment collection failed");
                    report.failures.push(SweepFailure {
                        customer_id: Some(customer_id),
                        repayment_ids: repayments.iter().map(|r| r.id).collect(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            processed = report.repayments.len(),
            failed = report.failures.len(),
            "repayment sweep finished"
        );
        report
    }
}
