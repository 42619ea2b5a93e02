use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{
    Account, AccountId, AccountRef, AtomicStore, BalanceUpdate, Destination, Error,
    ExternalRecipient, Money, NewTransaction, Page, StoreError, Transaction, TransactionKind,
    TransactionStatus, TransactionView, UserId, guard,
};
use crate::reference::ReferenceGenerator;

/// Attempts at the whole read-validate-commit cycle before giving up on a
/// contended account.
const COMMIT_RETRY_BUDGET: usize = 8;
/// Attempts at regenerating a transaction reference that collided in the
/// store. Collisions are store-enforced rarities, never caller-visible.
const REFERENCE_RETRY_BUDGET: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Money,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub account_id: AccountId,
    pub amount: Money,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_number: String,
    pub amount: Money,
    pub description: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_bank: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Orchestrates deposits, withdrawals, and transfers against an
/// [`AtomicStore`].
///
/// Every operation reads versioned account snapshots, runs all invariant
/// and authorization checks, then submits the balance update(s) and the
/// single ledger append as one commit. A stale snapshot retries the whole
/// cycle; nothing durable happens until the commit succeeds, so a failed
/// operation leaves no partial effect.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    references: ReferenceGenerator,
}

impl<S: AtomicStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            references: ReferenceGenerator::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn deposit(
        &self,
        request: DepositRequest,
        principal: UserId,
    ) -> Result<TransactionView, Error> {
        require_positive(request.amount)?;
        if let Some(view) = self.replayed(
            &request.idempotency_key,
            request.account_id,
            principal,
            TransactionKind::Deposit,
            request.amount,
        )? {
            return Ok(view);
        }

        let transaction = self.commit_with_retry(request.account_id, || {
            let account = self.owned_active_account(request.account_id, principal)?;
            let new_balance = account
                .balance
                .checked_add(request.amount)
                .ok_or_else(|| Error::invalid_argument("balance overflow"))?;

            let entry = NewTransaction {
                reference: String::new(),
                kind: TransactionKind::Deposit,
                amount: request.amount,
                currency: account.currency,
                description: Some(
                    request
                        .description
                        .clone()
                        .unwrap_or_else(|| "Cash Deposit".to_string()),
                ),
                status: TransactionStatus::Completed,
                source: None,
                destination: Destination::Internal {
                    account: account_ref(&account),
                    recipient_name: None,
                },
                balance_after: new_balance,
                idempotency_key: request.idempotency_key.clone(),
            };
            Ok((vec![balance_update(&account, new_balance)], entry))
        })?;

        info!(
            account = %request.account_id,
            amount = %request.amount,
            reference = %transaction.reference,
            "deposit committed"
        );
        Ok(transaction.view_from(request.account_id))
    }

    pub fn withdraw(
        &self,
        request: WithdrawRequest,
        principal: UserId,
    ) -> Result<TransactionView, Error> {
        require_positive(request.amount)?;
        if let Some(view) = self.replayed(
            &request.idempotency_key,
            request.account_id,
            principal,
            TransactionKind::Withdrawal,
            request.amount,
        )? {
            return Ok(view);
        }

        let transaction = self.commit_with_retry(request.account_id, || {
            let account = self.owned_active_account(request.account_id, principal)?;
            // The status check above does not imply funds; the balance is
            // verified on its own before anything is written.
            let new_balance = account
                .balance
                .checked_sub(request.amount)
                .ok_or(Error::InsufficientFunds {
                    account: account.id,
                })?;

            let entry = NewTransaction {
                reference: String::new(),
                kind: TransactionKind::Withdrawal,
                amount: request.amount,
                currency: account.currency,
                description: Some(
                    request
                        .description
                        .clone()
                        .unwrap_or_else(|| "Cash Withdrawal".to_string()),
                ),
                status: TransactionStatus::Completed,
                source: Some(account_ref(&account)),
                destination: Destination::None,
                balance_after: new_balance,
                idempotency_key: request.idempotency_key.clone(),
            };
            Ok((vec![balance_update(&account, new_balance)], entry))
        })?;

        info!(
            account = %request.account_id,
            amount = %request.amount,
            reference = %transaction.reference,
            "withdrawal committed"
        );
        Ok(transaction.view_from(request.account_id))
    }

    /// Transfer to an internal account (the destination number resolves
    /// here) or to an external recipient (it does not). The debit, the
    /// optional credit, and the single ledger entry are one atomic unit;
    /// an inactive internal destination fails the operation before any
    /// write happens.
    pub fn transfer(
        &self,
        request: TransferRequest,
        principal: UserId,
    ) -> Result<TransactionView, Error> {
        require_positive(request.amount)?;
        if let Some(view) = self.replayed(
            &request.idempotency_key,
            request.source_account_id,
            principal,
            TransactionKind::Transfer,
            request.amount,
        )? {
            return Ok(view);
        }

        let transaction = self.commit_with_retry(request.source_account_id, || {
            let source = self.owned_active_account(request.source_account_id, principal)?;
            let source_balance = source
                .balance
                .checked_sub(request.amount)
                .ok_or(Error::InsufficientFunds { account: source.id })?;

            let destination = self
                .store
                .account_by_number(&request.destination_account_number)?;

            let (mut updates, destination) = match destination {
                Some(dest) => {
                    if dest.id == source.id {
                        return Err(Error::invalid_argument(
                            "source and destination are the same account",
                        ));
                    }
                    if !dest.is_active() {
                        return Err(Error::invalid_state(
                            "destination account is not active",
                        ));
                    }
                    if dest.currency != source.currency {
                        return Err(Error::invalid_argument(format!(
                            "currency mismatch: {} vs {}",
                            source.currency, dest.currency
                        )));
                    }
                    let dest_balance = dest
                        .balance
                        .checked_add(request.amount)
                        .ok_or_else(|| Error::invalid_argument("balance overflow"))?;
                    let destination = Destination::Internal {
                        account: account_ref(&dest),
                        recipient_name: Some(dest.name.clone()),
                    };
                    (
                        vec![
                            balance_update(&source, source_balance),
                            balance_update(&dest, dest_balance),
                        ],
                        destination,
                    )
                }
                None => (
                    vec![balance_update(&source, source_balance)],
                    Destination::External(ExternalRecipient {
                        account_number: request.destination_account_number.clone(),
                        name: request.recipient_name.clone(),
                        bank: request.recipient_bank.clone(),
                    }),
                ),
            };
            // Fixed acquisition order for multi-account units.
            updates.sort_by_key(|u| u.account_id);

            let entry = NewTransaction {
                reference: String::new(),
                kind: TransactionKind::Transfer,
                amount: request.amount,
                currency: source.currency,
                description: request.description.clone(),
                status: TransactionStatus::Completed,
                source: Some(account_ref(&source)),
                destination,
                balance_after: source_balance,
                idempotency_key: request.idempotency_key.clone(),
            };
            Ok((updates, entry))
        })?;

        info!(
            source = %request.source_account_id,
            destination = %request.destination_account_number,
            amount = %request.amount,
            reference = %transaction.reference,
            "transfer committed"
        );
        Ok(transaction.view_from(request.source_account_id))
    }

    /// Ledger entries touching the account, newest first, owner-only.
    pub fn transactions_for_account(
        &self,
        account_id: AccountId,
        page: Page,
        principal: UserId,
    ) -> Result<Vec<TransactionView>, Error> {
        let account = self
            .store
            .account_by_id(account_id)?
            .ok_or_else(|| Error::not_found(format!("account {}", account_id)))?;
        guard::ensure_owner(&account, principal)?;

        let entries = self.store.transactions_by_account(account_id, page)?;
        Ok(entries
            .iter()
            .map(|tx| tx.view_from(account_id))
            .collect())
    }

    /// Look up one entry by reference. Accessible to the owner of either
    /// side; the view takes the caller's owned side as its perspective.
    pub fn transaction_by_reference(
        &self,
        reference: &str,
        principal: UserId,
    ) -> Result<TransactionView, Error> {
        let transaction = self
            .store
            .transaction_by_reference(reference)?
            .ok_or_else(|| Error::not_found(format!("transaction {}", reference)))?;

        for side in [
            transaction.source.as_ref(),
            transaction.destination.internal_account(),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(account) = self.store.account_by_id(side.id)? {
                if account.owner == principal {
                    return Ok(transaction.view_from(side.id));
                }
            }
        }
        Err(Error::forbidden(format!(
            "user {} has no side of transaction {}",
            principal, reference
        )))
    }

    /// Load an account the principal claims: it must exist and belong to
    /// them.
    fn owned_account(&self, id: AccountId, principal: UserId) -> Result<Account, Error> {
        let account = self
            .store
            .account_by_id(id)?
            .ok_or_else(|| Error::not_found(format!("account {}", id)))?;
        guard::ensure_owner(&account, principal)?;
        Ok(account)
    }

    /// Load an account for a money movement: it must exist, belong to
    /// the principal, and be active.
    fn owned_active_account(&self, id: AccountId, principal: UserId) -> Result<Account, Error> {
        let account = self.owned_account(id, principal)?;
        if !account.is_active() {
            return Err(Error::invalid_state("account is not active"));
        }
        Ok(account)
    }

    /// A request that carries an idempotency key already seen by the
    /// ledger is a replay: return the committed entry instead of posting
    /// again.
    ///
    /// The key is only honored after the request's account resolves and
    /// the principal owns it, and only when the committed entry is the
    /// same movement: same kind, same amount, anchored to that account.
    /// Anything else fails exactly as the fresh request would.
    fn replayed(
        &self,
        key: &Option<String>,
        perspective: AccountId,
        principal: UserId,
        kind: TransactionKind,
        amount: Money,
    ) -> Result<Option<TransactionView>, Error> {
        let Some(key) = key else { return Ok(None) };
        self.owned_account(perspective, principal)?;
        match self.store.transaction_by_idempotency_key(key)? {
            Some(existing) => {
                if !matches_movement(&existing, kind, amount, perspective) {
                    return Err(Error::Conflict(format!(
                        "idempotency key {} was used for a different movement",
                        key
                    )));
                }
                info!(key = %key, reference = %existing.reference, "idempotent replay");
                Ok(Some(existing.view_from(perspective)))
            }
            None => Ok(None),
        }
    }

    /// Run the read-validate-build cycle and commit it, retrying stale
    /// snapshots up to the budget and regenerating the reference on a
    /// store-reported collision. The closure re-reads fresh snapshots on
    /// every attempt.
    fn commit_with_retry(
        &self,
        perspective: AccountId,
        build: impl Fn() -> Result<(Vec<BalanceUpdate>, NewTransaction), Error>,
    ) -> Result<Transaction, Error> {
        for attempt in 0..COMMIT_RETRY_BUDGET {
            let (updates, mut entry) = build()?;
            entry.reference = self.references.transaction_reference();

            let mut reference_attempts = 0;
            loop {
                match self.store.commit(&updates, entry.clone()) {
                    Ok(transaction) => return Ok(transaction),
                    Err(StoreError::StaleVersion(id)) => {
                        warn!(account = %id, attempt, "stale snapshot, retrying");
                        break;
                    }
                    Err(StoreError::DuplicateReference(_)) => {
                        reference_attempts += 1;
                        if reference_attempts >= REFERENCE_RETRY_BUDGET {
                            return Err(Error::Unavailable(
                                "reference generation kept colliding".to_string(),
                            ));
                        }
                        entry.reference = self.references.transaction_reference();
                    }
                    Err(StoreError::DuplicateIdempotencyKey(key)) => {
                        // Lost a race against another submission of the
                        // same key; the winner's entry is the answer only
                        // if it is the same movement.
                        let existing = self
                            .store
                            .transaction_by_idempotency_key(&key)?
                            .ok_or_else(|| {
                                Error::Unavailable("idempotent entry vanished".to_string())
                            })?;
                        if !matches_movement(&existing, entry.kind, entry.amount, perspective) {
                            return Err(Error::Conflict(format!(
                                "idempotency key {} was used for a different movement",
                                key
                            )));
                        }
                        return Ok(existing);
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Err(Error::Unavailable(
            "commit retry budget exhausted".to_string(),
        ))
    }
}

/// Whether a committed entry is the same movement as a request: same kind,
/// same amount, and anchored to the request's account (the destination
/// for a deposit, the source otherwise).
fn matches_movement(
    existing: &Transaction,
    kind: TransactionKind,
    amount: Money,
    perspective: AccountId,
) -> bool {
    if existing.kind != kind || existing.amount != amount {
        return false;
    }
    match kind {
        TransactionKind::Deposit => existing
            .destination
            .internal_account()
            .is_some_and(|acc| acc.id == perspective),
        _ => existing.source.as_ref().is_some_and(|src| src.id == perspective),
    }
}

fn require_positive(amount: Money) -> Result<(), Error> {
    if amount.is_zero() {
        return Err(Error::invalid_argument("amount must be positive"));
    }
    Ok(())
}

fn account_ref(account: &Account) -> AccountRef {
    AccountRef {
        id: account.id,
        number: account.number.clone(),
    }
}

fn balance_update(account: &Account, new_balance: Money) -> BalanceUpdate {
    BalanceUpdate {
        account_id: account.id,
        expected_version: account.version,
        new_balance,
    }
}
