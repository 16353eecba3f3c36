pub mod actor;
pub mod adashe;
pub mod collateral;
pub mod config;
pub mod decimal;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod loans;
pub mod payments;
pub mod requests;
pub mod store;
pub mod types;
pub mod views;

#[cfg(test)]
mod fixtures;

// re-export key types
pub use actor::{Actor, ActorProvider, FixedActor};
pub use adashe::{AdasheCommissionCalculator, CommissionQuote};
pub use collateral::CollateralRequirement;
pub use config::{CollateralConfig, CommissionConfig, EngineConfig, ScheduleConfig};
pub use decimal::{Money, Rate};
pub use entities::{
    Account, AdasheCommission, AdasheSetup, Customer, Group, LoanApplication, LoanLiquidation, LoanProduct,
    LoanRepayment, Rejection, Transaction, User,
};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{AccountDesk, PostingResult, TransactionLedger};
pub use loans::LoanApplicationOrchestrator;
pub use payments::{
    AmortizationCalculator, LiquidationEngine, PaymentAllocation, RepaymentSchedule, RepaymentWaterfallProcessor,
    SweepFailure, SweepReport,
};
pub use requests::{
    ApprovalRequest, LiquidationRequest, LoanApplicationRequest, RejectionRequest, TransactionRequest, Validate,
};
pub use store::{LedgerStore, UnitOfWork};
pub use types::{
    AccountId, AccountStatus, AccountType, ApplicationId, CustomerId, GroupId, LoanStatus, ProductId, RejectionType,
    RepaymentId, RepaymentStatus, TransactionType, UserId,
};
pub use views::{LiquidationView, LoanApplicationView, RejectionView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
