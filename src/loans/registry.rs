//! Reference data: customers, staff, groups, products and adashe setup.

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use super::LoanApplicationOrchestrator;
use crate::adashe;
use crate::decimal::{Money, Rate};
use crate::entities::{AdasheCommission, AdasheSetup, Customer, Group, LoanProduct, User};
use crate::errors::{LedgerError, Result};

/// row lock serialising writes to the adashe setup versions
const ADASHE_SETUP_LOCK: Uuid = Uuid::nil();

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::ValidationFailed {
            violations: vec![format!("{field}: required")],
        });
    }
    Ok(())
}

impl LoanApplicationOrchestrator {
    pub fn register_customer(
        &self,
        name: &str,
        phone_number: Option<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Customer> {
        required("name", name)?;
        let mut customer = Customer::new(name.trim(), time_provider.now());
        customer.phone_number = phone_number;
        self.store().transaction(|uow| Ok(uow.save(customer)))
    }

    pub fn register_user(&self, username: &str) -> Result<User> {
        required("username", username)?;
        let user = User::new(username.trim());
        self.store().transaction(|uow| Ok(uow.save(user)))
    }

    pub fn register_group(&self, name: &str) -> Result<Group> {
        required("name", name)?;
        let group = Group::new(name.trim());
        self.store().transaction(|uow| Ok(uow.save(group)))
    }

    /// rates are percentages per tenor unit
    pub fn register_product(
        &self,
        name: &str,
        interest_rate: Rate,
        monitoring_fee_rate: Rate,
        processing_fee_rate: Rate,
    ) -> Result<LoanProduct> {
        required("name", name)?;
        let violations: Vec<String> = [
            ("interest_rate", interest_rate),
            ("monitoring_fee_rate", monitoring_fee_rate),
            ("processing_fee_rate", processing_fee_rate),
        ]
        .iter()
        .filter(|(_, rate)| rate.is_negative())
        .map(|(field, _)| format!("{field}: cannot be negative"))
        .collect();
        if !violations.is_empty() {
            return Err(LedgerError::ValidationFailed { violations });
        }

        let product = LoanProduct::new(name.trim(), interest_rate, monitoring_fee_rate, processing_fee_rate);
        self.store().transaction(|uow| Ok(uow.save(product)))
    }

    pub fn user(&self, user_id: Uuid) -> Result<User> {
        self.store().read(|uow| uow.find::<User>(user_id))
    }

    pub fn group(&self, group_id: Uuid) -> Result<Group> {
        self.store().read(|uow| uow.find::<Group>(group_id))
    }

    // adashe setup

    pub fn publish_adashe_setup(
        &self,
        commission_rate: Rate,
        minimum_deposit: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<AdasheSetup> {
        let _guard = self.store().lock(&[ADASHE_SETUP_LOCK]);
        self.store()
            .transaction(|uow| adashe::publish_setup(uow, commission_rate, minimum_deposit, time_provider.now()))
    }

    pub fn update_adashe_setup(&self, id: Uuid, commission_rate: Rate, minimum_deposit: Money) -> Result<AdasheSetup> {
        let _guard = self.store().lock(&[ADASHE_SETUP_LOCK]);
        self.store()
            .transaction(|uow| adashe::update_setup(uow, id, commission_rate, minimum_deposit))
    }

    pub fn adashe_setup(&self) -> Result<AdasheSetup> {
        self.store().read(|uow| adashe::latest_setup(uow))
    }

    pub fn commissions_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<AdasheCommission> {
        adashe::commissions_between(&self.store().begin(), start, end)
    }
}
