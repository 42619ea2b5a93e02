use crate::domain::account::{Account, AccountId};
use crate::domain::error::StoreError;
use crate::domain::money::Money;
use crate::domain::transaction::{NewTransaction, Transaction};

/// Zero-based page of a ledger query.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn of(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }
}

/// One version-checked balance write inside an atomic commit.
#[derive(Debug, Clone)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    /// Version the engine read its snapshot at; the commit fails with
    /// `StaleVersion` if the row has moved on.
    pub expected_version: u64,
    pub new_balance: Money,
}

/// Durable keyed storage for account records. Reads return snapshots;
/// balance writes only happen through [`AtomicStore::commit`].
pub trait AccountStore: Send + Sync {
    fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    fn account_by_number(&self, number: &str) -> Result<Option<Account>, StoreError>;
}

/// Append-only storage for ledger entries.
pub trait LedgerStore: Send + Sync {
    fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    fn transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Entries touching the account, newest first.
    fn transactions_by_account(
        &self,
        id: AccountId,
        page: Page,
    ) -> Result<Vec<Transaction>, StoreError>;
}

/// The atomicity boundary the engine commits through: every balance update
/// plus the single ledger append either all persist or none do, with no
/// partial state observable to concurrent operations.
pub trait AtomicStore: AccountStore + LedgerStore {
    fn commit(
        &self,
        updates: &[BalanceUpdate],
        entry: NewTransaction,
    ) -> Result<Transaction, StoreError>;
}
