/// serializable views handed to the transport layer
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::entities::{Customer, LoanApplication, LoanLiquidation, LoanProduct, Rejection};
use crate::errors::Result;
use crate::store::UnitOfWork;
use crate::types::{ApplicationId, CustomerId, GroupId, LoanStatus, RejectionType, RepaymentStatus, UserId};

/// serializable view of a loan application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplicationView {
    pub id: ApplicationId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub group_id: Option<GroupId>,
    pub status: LoanStatus,
    pub days_overdue: u32,
    pub request: RequestView,
    pub decision: DecisionView,
    pub product: ProductView,
    pub schedule: ScheduleView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub amount: Money,
    pub tenor: u32,
    pub collateral_deposit: Money,
    pub search_fee: Money,
    pub forms_fee: Money,
    pub applied_by: UserId,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionView {
    pub amount_approved: Option<Money>,
    pub tenor_approved: Option<u32>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub disbursed_by: Option<UserId>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub maturity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub name: String,
    pub interest_rate: Rate,
    pub monitoring_fee_rate: Rate,
    pub processing_fee_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub installments: u32,
    pub installments_paid: u32,
    pub installments_in_default: u32,
    pub total_repayable: Money,
    pub total_paid: Money,
    pub total_due: Money,
    pub next_due_date: Option<DateTime<Utc>>,
}

impl LoanApplicationView {
    pub fn build(uow: &UnitOfWork<'_>, application: &LoanApplication) -> Result<Self> {
        let customer = uow.find::<Customer>(application.customer_id)?;
        let product = uow.find::<LoanProduct>(application.product_id)?;
        let repayments = uow.repayments_for(application.id);

        let count = |status: RepaymentStatus| repayments.iter().filter(|r| r.status == status).count() as u32;

        Ok(LoanApplicationView {
            id: application.id,
            customer_id: customer.id,
            customer_name: customer.name,
            group_id: application.group_id,
            status: application.status,
            days_overdue: application.days_overdue,
            request: RequestView {
                amount: application.amount,
                tenor: application.tenor,
                collateral_deposit: application.collateral_deposit,
                search_fee: application.search_fee,
                forms_fee: application.forms_fee,
                applied_by: application.applied_by,
                applied_at: application.applied_at,
            },
            decision: DecisionView {
                amount_approved: application.amount_approved,
                tenor_approved: application.tenor_approved,
                approved_by: application.approved_by,
                approved_at: application.approved_at,
                disbursed_by: application.disbursed_by,
                disbursed_at: application.disbursed_at,
                maturity: application.maturity,
            },
            product: ProductView {
                name: product.name,
                interest_rate: product.interest_rate,
                monitoring_fee_rate: product.monitoring_fee_rate,
                processing_fee_rate: product.processing_fee_rate,
            },
            schedule: ScheduleView {
                installments: repayments.len() as u32,
                installments_paid: count(RepaymentStatus::Paid),
                installments_in_default: count(RepaymentStatus::Default),
                total_repayable: repayments.iter().map(|r| r.total).sum(),
                total_paid: repayments.iter().map(|r| r.total_paid).sum(),
                total_due: repayments.iter().filter(|r| r.status.is_open()).map(|r| r.total_due).sum(),
                next_due_date: repayments
                    .iter()
                    .filter(|r| r.status.is_open())
                    .map(|r| r.maturity_date)
                    .min(),
            },
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// serializable view of a liquidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationView {
    pub id: uuid::Uuid,
    pub application_id: ApplicationId,
    pub reason: String,
    pub amount: Money,
    pub loan_amount: Money,
    pub interest_amount: Money,
    pub interest_paid_amount: Money,
    pub actor: String,
    pub user_id: Option<UserId>,
    pub liquidated_at: DateTime<Utc>,
}

impl From<&LoanLiquidation> for LiquidationView {
    fn from(liquidation: &LoanLiquidation) -> Self {
        LiquidationView {
            id: liquidation.id,
            application_id: liquidation.application_id,
            reason: liquidation.liquidation_reason.clone(),
            amount: liquidation.amount,
            loan_amount: liquidation.loan_amount,
            interest_amount: liquidation.interest_amount,
            interest_paid_amount: liquidation.interest_paid_amount,
            actor: liquidation.actor.clone(),
            user_id: liquidation.user_id,
            liquidated_at: liquidation.liquidated_at,
        }
    }
}

impl LiquidationView {
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// serializable view of a rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionView {
    pub id: uuid::Uuid,
    pub application_id: ApplicationId,
    pub reason: String,
    pub rejection_type: RejectionType,
    pub resulting_status: LoanStatus,
    pub actor: String,
    pub rejected_at: DateTime<Utc>,
}

impl From<&Rejection> for RejectionView {
    fn from(rejection: &Rejection) -> Self {
        RejectionView {
            id: rejection.id,
            application_id: rejection.application_id,
            reason: rejection.reason.clone(),
            rejection_type: rejection.rejection_type,
            resulting_status: rejection.rejection_type.resulting_status(),
            actor: rejection.actor.clone(),
            rejected_at: rejection.rejected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_liquidation_view_json() {
        let liquidation = LoanLiquidation {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            user_id: None,
            actor: "SYSTEM".to_string(),
            liquidation_reason: "Early payoff".to_string(),
            amount: Money::from_major(8_150),
            loan_amount: Money::from_major(10_000),
            interest_amount: Money::from_major(150),
            interest_paid_amount: Money::from_major(150),
            liquidated_at: Utc::now(),
        };

        let view = LiquidationView::from(&liquidation);
        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"amount\": \"8150\""));
        assert!(json.contains("Early payoff"));

        let parsed: LiquidationView = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, view);
    }

    #[test]
    fn test_rejection_view_reports_status() {
        let rejection = Rejection {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            reason: "Incomplete documents".to_string(),
            rejection_type: RejectionType::Permanent,
            user_id: None,
            actor: "officer".to_string(),
            rejected_at: Utc::now(),
        };

        let view = RejectionView::from(&rejection);
        assert_eq!(view.resulting_status, LoanStatus::Blocked);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["rejection_type"], "PERMANENT");
    }
}
