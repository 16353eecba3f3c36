//! In-memory entity store with units of work and row locks.
//!
//! A unit of work stages every write and publishes them together on commit;
//! dropping it discards them. Row locks serialize operations on the same
//! customer or application for the duration of a unit of work.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Condvar, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{
    Account, AdasheCommission, AdasheSetup, Customer, Group, LoanApplication, LoanLiquidation, LoanProduct,
    LoanRepayment, Rejection, Transaction, User,
};
use crate::errors::{LedgerError, Result};
use crate::types::{AccountId, AccountStatus, AccountType, ApplicationId, CustomerId, LoanStatus};

pub type Table<E> = BTreeMap<Uuid, E>;

/// one table per entity kind
#[derive(Debug, Default, Clone)]
pub struct Tables {
    customers: Table<Customer>,
    users: Table<User>,
    groups: Table<Group>,
    products: Table<LoanProduct>,
    applications: Table<LoanApplication>,
    accounts: Table<Account>,
    repayments: Table<LoanRepayment>,
    liquidations: Table<LoanLiquidation>,
    transactions: Table<Transaction>,
    adashe_setups: Table<AdasheSetup>,
    adashe_commissions: Table<AdasheCommission>,
    rejections: Table<Rejection>,
}

impl Tables {
    fn merge(&mut self, staged: Tables) {
        self.customers.extend(staged.customers);
        self.users.extend(staged.users);
        self.groups.extend(staged.groups);
        self.products.extend(staged.products);
        self.applications.extend(staged.applications);
        self.accounts.extend(staged.accounts);
        self.repayments.extend(staged.repayments);
        self.liquidations.extend(staged.liquidations);
        self.transactions.extend(staged.transactions);
        self.adashe_setups.extend(staged.adashe_setups);
        self.adashe_commissions.extend(staged.adashe_commissions);
        self.rejections.extend(staged.rejections);
    }
}

/// entity that can live in the store
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    #[doc(hidden)]
    fn table(tables: &Tables) -> &Table<Self>;

    #[doc(hidden)]
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

macro_rules! record {
    ($entity:ty, $field:ident, $kind:literal) => {
        impl Record for $entity {
            const KIND: &'static str = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn table(tables: &Tables) -> &Table<Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                &mut tables.$field
            }
        }
    };
}

record!(Customer, customers, "customer");
record!(User, users, "user");
record!(Group, groups, "group");
record!(LoanProduct, products, "loan product");
record!(LoanApplication, applications, "loan application");
record!(Account, accounts, "account");
record!(LoanRepayment, repayments, "loan repayment");
record!(LoanLiquidation, liquidations, "loan liquidation");
record!(Transaction, transactions, "transaction");
record!(AdasheSetup, adashe_setups, "adashe setup");
record!(AdasheCommission, adashe_commissions, "adashe commission");
record!(Rejection, rejections, "rejection");

/// shared ledger storage
#[derive(Debug, Default)]
pub struct LedgerStore {
    tables: RwLock<Tables>,
    locks: RowLocks,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// start a unit of work
    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            store: self,
            staged: Tables::default(),
        }
    }

    /// run `work` in a unit of work; commit on success, discard on error
    pub fn transaction<T>(&self, work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T>) -> Result<T> {
        let mut uow = self.begin();
        let output = work(&mut uow)?;
        uow.commit();
        Ok(output)
    }

    /// read-only access; nothing staged is ever published
    pub fn read<T>(&self, query: impl FnOnce(&UnitOfWork<'_>) -> Result<T>) -> Result<T> {
        query(&self.begin())
    }

    /// block until every key is free, then hold them all
    pub fn lock(&self, keys: &[Uuid]) -> RowGuard<'_> {
        self.locks.acquire(keys)
    }
}

/// staged view over the store
pub struct UnitOfWork<'s> {
    store: &'s LedgerStore,
    staged: Tables,
}

impl<'s> UnitOfWork<'s> {
    pub fn get<E: Record>(&self, id: Uuid) -> Option<E> {
        if let Some(entity) = E::table(&self.staged).get(&id) {
            return Some(entity.clone());
        }
        let base = self.store.tables.read().unwrap_or_else(PoisonError::into_inner);
        E::table(&base).get(&id).cloned()
    }

    pub fn find<E: Record>(&self, id: Uuid) -> Result<E> {
        self.get(id).ok_or(LedgerError::NotFound { entity: E::KIND, id })
    }

    /// every entity matching `predicate`, staged versions shadowing stored ones
    pub fn find_where<E: Record>(&self, predicate: impl Fn(&E) -> bool) -> Vec<E> {
        let staged = E::table(&self.staged);
        let base = self.store.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<E> = E::table(&base)
            .iter()
            .filter(|(id, _)| !staged.contains_key(id))
            .map(|(_, entity)| entity)
            .filter(|entity| predicate(entity))
            .cloned()
            .collect();
        found.extend(staged.values().filter(|entity| predicate(entity)).cloned());
        found
    }

    pub fn save<E: Record>(&mut self, entity: E) -> E {
        E::table_mut(&mut self.staged).insert(entity.id(), entity.clone());
        entity
    }

    pub fn save_all<E: Record>(&mut self, entities: Vec<E>) -> Vec<E> {
        let table = E::table_mut(&mut self.staged);
        for entity in &entities {
            table.insert(entity.id(), entity.clone());
        }
        entities
    }

    /// publish every staged write at once
    pub fn commit(self) {
        let mut base = self.store.tables.write().unwrap_or_else(PoisonError::into_inner);
        base.merge(self.staged);
    }

    // typed finders

    pub fn applications_with_status(&self, statuses: &[LoanStatus]) -> Vec<LoanApplication> {
        let mut found = self.find_where(|a: &LoanApplication| statuses.contains(&a.status));
        found.sort_by_key(|a| a.applied_at);
        found
    }

    pub fn accounts_of_type(&self, customer_id: CustomerId, account_type: AccountType) -> Vec<Account> {
        let mut found = self.find_where(|a: &Account| a.customer_id == customer_id && a.account_type == account_type);
        found.sort_by_key(|a| a.opened_at);
        found
    }

    /// the customer's account of a type, active accounts first
    pub fn account_of_type(&self, customer_id: CustomerId, account_type: AccountType) -> Option<Account> {
        let accounts = self.accounts_of_type(customer_id, account_type);
        accounts
            .iter()
            .find(|a| a.is_active())
            .or_else(|| accounts.first())
            .cloned()
    }

    pub fn require_account(&self, customer_id: CustomerId, account_type: AccountType) -> Result<Account> {
        self.account_of_type(customer_id, account_type)
            .ok_or(LedgerError::AccountNotFound { account_type, owner: customer_id })
    }

    pub fn active_loan_account(&self, customer_id: CustomerId) -> Option<Account> {
        self.find_where(|a: &Account| {
            a.customer_id == customer_id && a.account_type == AccountType::Loan && a.status == AccountStatus::Active
        })
        .into_iter()
        .next()
    }

    /// LOAN account opened for an application
    pub fn loan_account_for(&self, application_id: ApplicationId) -> Result<Account> {
        self.find_where(|a: &Account| a.account_type == AccountType::Loan && a.loan_id == Some(application_id))
            .into_iter()
            .next()
            .ok_or(LedgerError::AccountNotFound {
                account_type: AccountType::Loan,
                owner: application_id,
            })
    }

    pub fn repayments_for(&self, application_id: ApplicationId) -> Vec<LoanRepayment> {
        let mut found = self.find_where(|r: &LoanRepayment| r.application_id == application_id);
        found.sort_by_key(|r| r.installment_number);
        found
    }

    /// PENDING or DEFAULT installments of an application, in schedule order
    pub fn open_repayments_for(&self, application_id: ApplicationId) -> Vec<LoanRepayment> {
        let mut found =
            self.find_where(|r: &LoanRepayment| r.application_id == application_id && r.status.is_open());
        found.sort_by_key(|r| r.installment_number);
        found
    }

    /// PENDING or DEFAULT installments with maturity at or before `now`
    pub fn due_repayments(&self, now: DateTime<Utc>) -> Vec<LoanRepayment> {
        let mut found = self.find_where(|r: &LoanRepayment| r.status.is_open() && r.maturity_date <= now);
        found.sort_by_key(|r| (r.maturity_date, r.installment_number));
        found
    }

    pub fn transactions_for(&self, account_id: AccountId) -> Vec<Transaction> {
        let mut found = self.find_where(|t: &Transaction| t.account_id == account_id);
        found.sort_by_key(|t| t.recorded_at);
        found
    }
}

/// keyed mutual exclusion; a guard owns a whole key set
#[derive(Debug, Default)]
pub struct RowLocks {
    held: Mutex<HashSet<Uuid>>,
    released: Condvar,
}

impl RowLocks {
    /// acquire all keys at once so two callers never hold halves of each other's sets
    pub fn acquire(&self, keys: &[Uuid]) -> RowGuard<'_> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while keys.iter().any(|key| held.contains(key)) {
            held = self.released.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(keys.iter().copied());

        RowGuard { locks: self, keys }
    }
}

pub struct RowGuard<'a> {
    locks: &'a RowLocks,
    keys: Vec<Uuid>,
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
