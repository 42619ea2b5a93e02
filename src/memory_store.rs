use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::{
    Account, AccountId, AccountKind, AccountStatus, AccountStore, AtomicStore, BalanceUpdate,
    Currency, Error, LedgerStore, Money, NewTransaction, Page, StoreError, Transaction,
    TransactionId, UserId,
};
use crate::reference::ReferenceGenerator;

const NUMBER_RETRY_BUDGET: usize = 4;

/// Thread-safe in-memory implementation of the store traits.
///
/// A single mutex guards both tables, so a commit is all-or-nothing by
/// construction; the version checks still run, which is what gives the
/// engine its compare-and-swap discipline against concurrent writers.
/// Account opening lives here too: the number is generated before the row
/// is first written and regenerated only on a collision with an existing
/// row.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    references: ReferenceGenerator,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    numbers: HashMap<String, AccountId>,
    ledger: Vec<Transaction>,
    by_reference: HashMap<String, usize>,
    by_idempotency_key: HashMap<String, usize>,
    next_account_id: u64,
    next_transaction_id: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    /// Open an account with a zero balance or a defined opening credit.
    pub fn open_account(
        &self,
        owner: UserId,
        name: &str,
        kind: AccountKind,
        currency: Currency,
        opening_balance: Money,
    ) -> Result<Account, StoreError> {
        let mut inner = self.lock()?;

        let mut number = self.references.account_number();
        let mut attempts = 1;
        while inner.numbers.contains_key(&number) {
            if attempts >= NUMBER_RETRY_BUDGET {
                return Err(StoreError::DuplicateAccountNumber(number));
            }
            number = self.references.account_number();
            attempts += 1;
        }

        inner.next_account_id += 1;
        let now = Utc::now();
        let account = Account {
            id: AccountId(inner.next_account_id),
            number: number.clone(),
            name: name.to_string(),
            kind,
            balance: opening_balance,
            currency,
            status: AccountStatus::Active,
            owner,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        inner.numbers.insert(number, account.id);
        inner.accounts.insert(account.id, account.clone());
        tracing::debug!(account = %account.id, number = %account.number, "account opened");
        Ok(account)
    }

    /// Administrative status changes route through the domain transition
    /// rules and bump the row version so in-flight snapshots go stale.
    pub fn freeze_account(&self, id: AccountId) -> Result<(), Error> {
        self.mutate_account(id, Account::freeze)
    }

    pub fn unfreeze_account(&self, id: AccountId) -> Result<(), Error> {
        self.mutate_account(id, Account::unfreeze)
    }

    pub fn close_account(&self, id: AccountId) -> Result<(), Error> {
        self.mutate_account(id, Account::close)
    }

    pub fn rename_account(&self, id: AccountId, name: &str) -> Result<(), Error> {
        self.mutate_account(id, |account| {
            account.rename(name);
            Ok(())
        })
    }

    fn mutate_account(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut Account) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut inner = self.lock()?;
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or(StoreError::MissingAccount(id))?;
        f(account)?;
        account.version += 1;
        account.updated_at = Utc::now();
        Ok(())
    }
}

impl AccountStore for InMemoryStore {
    fn account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    fn account_by_number(&self, number: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.lock()?;
        let id = match inner.numbers.get(number) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(inner.accounts.get(&id).cloned())
    }
}

impl LedgerStore for InMemoryStore {
    fn transaction_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|&idx| inner.ledger.get(idx))
            .cloned())
    }

    fn transaction_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .by_idempotency_key
            .get(key)
            .and_then(|&idx| inner.ledger.get(idx))
            .cloned())
    }

    fn transactions_by_account(
        &self,
        id: AccountId,
        page: Page,
    ) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .ledger
            .iter()
            .rev()
            .filter(|tx| {
                tx.source.as_ref().is_some_and(|s| s.id == id)
                    || tx
                        .destination
                        .internal_account()
                        .is_some_and(|d| d.id == id)
            })
            .skip(page.offset())
            .take(page.size)
            .cloned()
            .collect())
    }
}

impl AtomicStore for InMemoryStore {
    fn commit(
        &self,
        updates: &[BalanceUpdate],
        entry: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let mut inner = self.lock()?;

        // Validate everything before touching anything; a failure here
        // must leave no trace of the unit.
        for update in updates {
            let account = inner
                .accounts
                .get(&update.account_id)
                .ok_or(StoreError::MissingAccount(update.account_id))?;
            if account.version != update.expected_version {
                return Err(StoreError::StaleVersion(update.account_id));
            }
        }
        if inner.by_reference.contains_key(&entry.reference) {
            return Err(StoreError::DuplicateReference(entry.reference));
        }
        if let Some(key) = &entry.idempotency_key {
            if inner.by_idempotency_key.contains_key(key) {
                return Err(StoreError::DuplicateIdempotencyKey(key.clone()));
            }
        }

        let now = Utc::now();
        for update in updates {
            // Presence was checked above; the lock has been held since.
            if let Some(account) = inner.accounts.get_mut(&update.account_id) {
                account.balance = update.new_balance;
                account.version += 1;
                account.updated_at = now;
            }
        }

        inner.next_transaction_id += 1;
        let transaction = Transaction {
            id: TransactionId(inner.next_transaction_id),
            reference: entry.reference,
            kind: entry.kind,
            amount: entry.amount,
            currency: entry.currency,
            description: entry.description,
            status: entry.status,
            source: entry.source,
            destination: entry.destination,
            balance_after: entry.balance_after,
            idempotency_key: entry.idempotency_key,
            created_at: now,
        };
        let idx = inner.ledger.len();
        inner
            .by_reference
            .insert(transaction.reference.clone(), idx);
        if let Some(key) = &transaction.idempotency_key {
            inner.by_idempotency_key.insert(key.clone(), idx);
        }
        inner.ledger.push(transaction.clone());
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Destination, TransactionKind, TransactionStatus};

    fn store_with_account(balance: &str) -> (InMemoryStore, Account) {
        let store = InMemoryStore::new();
        let account = store
            .open_account(
                UserId(1),
                "Main",
                AccountKind::Checking,
                Currency::PHP,
                Money::parse(balance).unwrap(),
            )
            .unwrap();
        (store, account)
    }

    fn entry(reference: &str, balance_after: &str) -> NewTransaction {
        NewTransaction {
            reference: reference.to_string(),
            kind: TransactionKind::Deposit,
            amount: Money::parse("10.00").unwrap(),
            currency: Currency::PHP,
            description: None,
            status: TransactionStatus::Completed,
            source: None,
            destination: Destination::None,
            balance_after: Money::parse(balance_after).unwrap(),
            idempotency_key: None,
        }
    }

    #[test]
    fn stale_version_commit_writes_nothing() {
        let (store, account) = store_with_account("100.00");
        let update = BalanceUpdate {
            account_id: account.id,
            expected_version: account.version + 1,
            new_balance: Money::parse("110.00").unwrap(),
        };
        let err = store.commit(&[update], entry("TXNA", "110.00")).unwrap_err();
        assert_eq!(err, StoreError::StaleVersion(account.id));

        let after = store.account_by_id(account.id).unwrap().unwrap();
        assert_eq!(after.balance, Money::parse("100.00").unwrap());
        assert!(store.transaction_by_reference("TXNA").unwrap().is_none());
    }

    #[test]
    fn duplicate_reference_is_rejected_before_any_write() {
        let (store, account) = store_with_account("100.00");
        let update = |version| BalanceUpdate {
            account_id: account.id,
            expected_version: version,
            new_balance: Money::parse("110.00").unwrap(),
        };
        store
            .commit(&[update(account.version)], entry("TXNA", "110.00"))
            .unwrap();
        let err = store
            .commit(&[update(account.version + 1)], entry("TXNA", "120.00"))
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateReference("TXNA".to_string()));

        let after = store.account_by_id(account.id).unwrap().unwrap();
        assert_eq!(after.balance, Money::parse("110.00").unwrap());
    }

    #[test]
    fn status_change_bumps_the_row_version() {
        let (store, account) = store_with_account("0");
        store.freeze_account(account.id).unwrap();
        let frozen = store.account_by_id(account.id).unwrap().unwrap();
        assert_eq!(frozen.status, AccountStatus::Frozen);
        assert_eq!(frozen.version, account.version + 1);
    }

    #[test]
    fn paging_walks_the_ledger_newest_first() {
        let (store, account) = store_with_account("0");
        for i in 0..5 {
            let update = BalanceUpdate {
                account_id: account.id,
                expected_version: i,
                new_balance: Money::parse("10.00").unwrap(),
            };
            let mut e = entry(&format!("TXN{}", i), "10.00");
            e.destination = Destination::Internal {
                account: crate::domain::AccountRef {
                    id: account.id,
                    number: account.number.clone(),
                },
                recipient_name: None,
            };
            store.commit(&[update], e).unwrap();
        }
        let first = store
            .transactions_by_account(account.id, Page::of(0, 2))
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].reference, "TXN4");
        let last = store
            .transactions_by_account(account.id, Page::of(2, 2))
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].reference, "TXN0");
    }
}
