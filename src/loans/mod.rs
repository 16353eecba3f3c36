//! Loan application lifecycle: apply, approve, disburse, collect, liquidate, reject.
//!
//! Every operation runs as one unit of work under the row locks of the
//! customer, application and group it touches. Events are published only after the
//! unit commits.

mod registry;

use std::sync::{Arc, Mutex, PoisonError};

use hourglass_rs::SafeTimeProvider;
use tracing::instrument;
use uuid::Uuid;

use crate::actor::Actor;
use crate::collateral::CollateralRequirement;
use crate::config::EngineConfig;
use crate::entities::{
    Account, Customer, Group, LoanApplication, LoanLiquidation, LoanProduct, LoanRepayment, Rejection, User,
};
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::{new_reference, AccountDesk, TransactionLedger};
use crate::payments::{AmortizationCalculator, LiquidationEngine, RepaymentWaterfallProcessor, SweepReport};
use crate::requests::{validate_request, ApprovalRequest, LiquidationRequest, LoanApplicationRequest, RejectionRequest};
use crate::store::{LedgerStore, UnitOfWork};
use crate::types::{AccountType, ApplicationId, CustomerId, LoanStatus, UserId};
use crate::views::{LiquidationView, LoanApplicationView, RejectionView};

/// composes the calculators into transactional loan operations
pub struct LoanApplicationOrchestrator {
    store: Arc<LedgerStore>,
    config: EngineConfig,
    amortization: AmortizationCalculator,
    waterfall: RepaymentWaterfallProcessor,
    liquidation: LiquidationEngine,
    collateral: CollateralRequirement,
    events: Mutex<EventStore>,
}

impl LoanApplicationOrchestrator {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_store(Arc::new(LedgerStore::new()), config)
    }

    pub fn with_store(store: Arc<LedgerStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            amortization: AmortizationCalculator::new(&config.schedule),
            waterfall: RepaymentWaterfallProcessor::new(),
            liquidation: LiquidationEngine::new(),
            collateral: CollateralRequirement::new(&config.collateral),
            config,
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// manual postings and account opening
    pub fn accounts(&self) -> AccountDesk<'_> {
        AccountDesk::new(&self.store, &self.config)
    }

    pub fn system_actor(&self) -> Actor {
        Actor::system(self.config.system_actor.clone())
    }

    /// drain every event published so far
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).take_events()
    }

    fn publish(&self, local: &mut EventStore) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).absorb(local);
    }

    /// lock keys for an existing application: its customer and itself
    fn application_keys(&self, application_id: ApplicationId) -> Result<[Uuid; 2]> {
        let application = self.store.read(|uow| uow.find::<LoanApplication>(application_id))?;
        Ok([application.customer_id, application_id])
    }

    fn ensure_no_running_loan(uow: &UnitOfWork<'_>, customer_id: CustomerId) -> Result<()> {
        if uow.active_loan_account(customer_id).is_some() {
            return Err(LedgerError::DuplicateActiveLoan { customer_id });
        }
        Ok(())
    }

    /// validate collateral, credit the deposit and record a PENDING application
    #[instrument(
        name = "loans.create_application",
        skip(self, request, actor, time_provider),
        fields(customer_id = %request.customer_id, amount = %request.amount),
        err
    )]
    pub fn create_application(
        &self,
        request: &LoanApplicationRequest,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
    ) -> Result<LoanApplicationView> {
        validate_request(request)?;
        self.amortization.installment_count(request.tenor)?;

        let mut keys = vec![request.customer_id];
        keys.extend(request.group_id);
        let _guard = self.store.lock(&keys);

        let mut local = EventStore::new();
        let view = self.store.transaction(|uow| {
            uow.find::<Customer>(request.customer_id)?;
            uow.find::<LoanProduct>(request.product_id)?;
            uow.find::<User>(request.applied_by)?;
            let group = request.group_id.map(|id| uow.find::<Group>(id)).transpose()?;

            Self::ensure_no_running_loan(uow, request.customer_id)?;

            let held = self.collateral.held(uow, request.customer_id);
            if let Err(error) = self.collateral.check(held, request.collateral_deposit, request.amount) {
                tracing::error!(%held, deposit = %request.collateral_deposit, "collateral deposit not enough");
                return Err(error);
            }

            let now = time_provider.now();
            let reference = new_reference(now);
            let account = self.collateral.deposit(
                uow,
                request.customer_id,
                request.collateral_deposit,
                &reference,
                &actor.username,
                now,
            );
            if request.collateral_deposit.is_positive() {
                local.emit(Event::CollateralDeposited {
                    account_id: account.id,
                    amount: request.collateral_deposit,
                    new_balance: account.balance,
                    timestamp: now,
                });
            }

            if let Some(mut group) = group {
                group.number_of_members += 1;
                uow.save(group);
            }

            let application = uow.save(LoanApplication {
                id: Uuid::new_v4(),
                customer_id: request.customer_id,
                product_id: request.product_id,
                group_id: request.group_id,
                amount: request.amount,
                tenor: request.tenor,
                collateral_deposit: request.collateral_deposit,
                search_fee: request.search_fee,
                forms_fee: request.forms_fee,
                amount_approved: None,
                tenor_approved: None,
                status: LoanStatus::Pending,
                days_overdue: 0,
                applied_by: request.applied_by,
                approved_by: None,
                disbursed_by: None,
                applied_at: now,
                approved_at: None,
                disbursed_at: None,
                maturity: None,
            });

            tracing::info!(application_id = %application.id, "loan application submitted");
            local.emit(Event::ApplicationSubmitted {
                application_id: application.id,
                customer_id: application.customer_id,
                amount: application.amount,
                timestamp: now,
            });
            LoanApplicationView::build(uow, &application)
        })?;

        self.publish(&mut local);
        Ok(view)
    }

    /// record the approved amount and tenor
    #[instrument(name = "loans.approve", skip(self, request, time_provider), fields(loan_id = %request.loan_id), err)]
    pub fn approve(&self, request: &ApprovalRequest, time_provider: &SafeTimeProvider) -> Result<LoanApplicationView> {
        validate_request(request)?;
        self.amortization.installment_count(request.tenor_approved)?;
        let _guard = self.store.lock(&self.application_keys(request.loan_id)?);

        let mut local = EventStore::new();
        let view = self.store.transaction(|uow| {
            let mut application = uow.find::<LoanApplication>(request.loan_id)?;
            uow.find::<User>(request.approver_id)?;
            application.status = application.status.transition(LoanStatus::Approved)?;
            Self::ensure_no_running_loan(uow, application.customer_id)?;

            let now = time_provider.now();
            application.amount_approved = Some(request.amount_approved);
            application.tenor_approved = Some(request.tenor_approved);
            application.approved_by = Some(request.approver_id);
            application.approved_at = Some(now);
            let application = uow.save(application);

            tracing::info!(amount = %request.amount_approved, tenor = request.tenor_approved, "loan approved");
            local.emit(Event::ApplicationApproved {
                application_id: application.id,
                amount_approved: request.amount_approved,
                tenor_approved: request.tenor_approved,
                timestamp: now,
            });
            LoanApplicationView::build(uow, &application)
        })?;

        self.publish(&mut local);
        Ok(view)
    }

    /// generate the schedule, open the loan account and pay the approved amount into savings
    #[instrument(name = "loans.disburse", skip(self, time_provider), err)]
    pub fn disburse(
        &self,
        loan_id: ApplicationId,
        actor_id: UserId,
        time_provider: &SafeTimeProvider,
    ) -> Result<LoanApplicationView> {
        let _guard = self.store.lock(&self.application_keys(loan_id)?);

        let mut local = EventStore::new();
        let view = self.store.transaction(|uow| {
            let mut application = uow.find::<LoanApplication>(loan_id)?;
            let disburser = uow.find::<User>(actor_id)?;
            application.status = application.status.transition(LoanStatus::Active)?;
            Self::ensure_no_running_loan(uow, application.customer_id)?;

            let (amount, tenor) = application.approved_terms().ok_or_else(|| LedgerError::ValidationFailed {
                violations: vec!["amount_approved: approved terms missing".to_string()],
            })?;
            let product = uow.find::<LoanProduct>(application.product_id)?;
            let mut savings = uow.require_account(application.customer_id, AccountType::Savings)?;

            let now = time_provider.now();
            let reference = new_reference(now);
            let schedule = self.amortization.generate(application.id, amount, tenor, &product, now)?;
            let total_repayable = schedule.total_repayable();

            TransactionLedger::record(
                uow,
                &mut savings,
                "Loan disbursement",
                amount,
                &reference,
                Some(disburser.username.as_str()),
                now,
            );

            let loan_cycle = uow.accounts_of_type(application.customer_id, AccountType::Loan).len() as u32 + 1;
            let mut loan_account = Account::open(application.customer_id, AccountType::Loan, product.name.clone(), now);
            loan_account.loan_cycle = loan_cycle;
            loan_account.loan_id = Some(application.id);
            TransactionLedger::record(
                uow,
                &mut loan_account,
                "Loan disbursement",
                total_repayable,
                &reference,
                Some(disburser.username.as_str()),
                now,
            );

            let installments = schedule.installment_count();
            let maturity = schedule.maturity();
            let drift = schedule.rounding_drift();
            uow.save_all(schedule.installments);

            application.disbursed_by = Some(actor_id);
            application.disbursed_at = Some(now);
            application.maturity = Some(maturity);
            let application = uow.save(application);

            tracing::info!(
                %amount,
                %total_repayable,
                installments,
                loan_cycle,
                %drift,
                "loan disbursed"
            );
            local.emit(Event::LoanDisbursed {
                application_id: application.id,
                amount,
                total_repayable,
                installments,
                maturity,
                timestamp: now,
            });
            LoanApplicationView::build(uow, &application)
        })?;

        self.publish(&mut local);
        Ok(view)
    }

    /// collect every due installment
    #[instrument(name = "loans.repay", skip(self, time_provider))]
    pub fn repay(&self, time_provider: &SafeTimeProvider) -> SweepReport {
        let mut local = EventStore::new();
        let report = self.waterfall.sweep(&self.store, time_provider, &mut local);
        self.publish(&mut local);
        report
    }

    /// settle a running loan early from savings
    #[instrument(
        name = "loans.liquidate",
        skip(self, request, actor, time_provider),
        fields(loan_id = %request.loan_id, interest_charged = %request.interest_charged),
        err
    )]
    pub fn liquidate(
        &self,
        request: &LiquidationRequest,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
    ) -> Result<LiquidationView> {
        validate_request(request)?;
        let _guard = self.store.lock(&self.application_keys(request.loan_id)?);

        let mut local = EventStore::new();
        let liquidation = self.store.transaction(|uow| {
            let now = time_provider.now();
            let reference = new_reference(now);
            self.liquidation.liquidate(uow, request, actor, &reference, now, &mut local)
        })?;

        self.publish(&mut local);
        Ok(LiquidationView::from(&liquidation))
    }

    /// decline a PENDING or APPROVED application
    #[instrument(
        name = "loans.reject",
        skip(self, request, actor, time_provider),
        fields(loan_id = %request.loan_id),
        err
    )]
    pub fn reject(
        &self,
        request: &RejectionRequest,
        actor: &Actor,
        time_provider: &SafeTimeProvider,
    ) -> Result<RejectionView> {
        validate_request(request)?;
        let _guard = self.store.lock(&self.application_keys(request.loan_id)?);

        let mut local = EventStore::new();
        let rejection = self.store.transaction(|uow| {
            let mut application = uow.find::<LoanApplication>(request.loan_id)?;
            application.status = application
                .status
                .transition(request.rejection_type.resulting_status())?;
            uow.save(application);

            let now = time_provider.now();
            let rejection = uow.save(Rejection {
                id: Uuid::new_v4(),
                application_id: request.loan_id,
                reason: request.reason.clone(),
                rejection_type: request.rejection_type,
                user_id: actor.user_id,
                actor: actor.username.clone(),
                rejected_at: now,
            });
            local.emit(Event::ApplicationRejected {
                application_id: request.loan_id,
                rejection_type: request.rejection_type,
                reason: request.reason.clone(),
                timestamp: now,
            });
            Ok(rejection)
        })?;

        self.publish(&mut local);
        Ok(RejectionView::from(&rejection))
    }

    // queries

    pub fn find(&self, loan_id: ApplicationId) -> Result<LoanApplicationView> {
        self.store.read(|uow| {
            let application = uow.find::<LoanApplication>(loan_id)?;
            LoanApplicationView::build(uow, &application)
        })
    }

    pub fn all(&self) -> Result<Vec<LoanApplicationView>> {
        self.views_with_status(&[
            LoanStatus::Pending,
            LoanStatus::Approved,
            LoanStatus::Active,
            LoanStatus::Due,
            LoanStatus::PaidOff,
            LoanStatus::Rejected,
            LoanStatus::Blocked,
        ])
    }

    /// applications still awaiting disbursement
    pub fn pending(&self) -> Result<Vec<LoanApplicationView>> {
        self.views_with_status(&[LoanStatus::Pending, LoanStatus::Approved])
    }

    fn views_with_status(&self, statuses: &[LoanStatus]) -> Result<Vec<LoanApplicationView>> {
        self.store.read(|uow| {
            uow.applications_with_status(statuses)
                .iter()
                .map(|application| LoanApplicationView::build(uow, application))
                .collect()
        })
    }

    pub fn repayments_for(&self, loan_id: ApplicationId) -> Result<Vec<LoanRepayment>> {
        self.store.read(|uow| {
            uow.find::<LoanApplication>(loan_id)?;
            Ok(uow.repayments_for(loan_id))
        })
    }

    /// installments the next sweep would pick up
    pub fn expected_repayments(&self, time_provider: &SafeTimeProvider) -> Vec<LoanRepayment> {
        self.store.begin().due_repayments(time_provider.now())
    }

    pub fn liquidation_for(&self, loan_id: ApplicationId) -> Result<LiquidationView> {
        self.store.read(|uow| {
            uow.find_where(|l: &LoanLiquidation| l.application_id == loan_id)
                .first()
                .map(LiquidationView::from)
                .ok_or(LedgerError::NotFound {
                    entity: "loan liquidation",
                    id: loan_id,
                })
        })
    }

    pub fn rejections_for(&self, loan_id: ApplicationId) -> Result<Vec<RejectionView>> {
        self.store.read(|uow| {
            uow.find::<LoanApplication>(loan_id)?;
            let mut rejections = uow.find_where(|r: &Rejection| r.application_id == loan_id);
            rejections.sort_by_key(|r| r.rejected_at);
            Ok(rejections.iter().map(RejectionView::from).collect())
        })
    }
}
