use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::account::AccountId;
use crate::domain::money::{Currency, Money};

/// Store-assigned ledger entry identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// `Payment` and `Refund` are reserved for future collaborators; this
/// engine only emits the first three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
    Refund,
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Payment => "PAYMENT",
            TransactionKind::Refund => "REFUND",
        };
        f.write_str(s)
    }
}

/// Entries are created `Completed`; the other states are reserved for
/// asynchronous clearing flows that would extend `Pending` into one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Reference to an account held in this store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: AccountId,
    pub number: String,
}

/// Recipient details for a transfer that left the institution. Stored as
/// plain text; there is no internal account to point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRecipient {
    pub account_number: String,
    pub name: Option<String>,
    pub bank: Option<String>,
}

/// Credit side of an entry. Exactly one shape applies: an internal
/// account, an external recipient, or nothing (withdrawals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    None,
    Internal {
        account: AccountRef,
        recipient_name: Option<String>,
    },
    External(ExternalRecipient),
}

impl Destination {
    pub fn internal_account(&self) -> Option<&AccountRef> {
        match self {
            Destination::Internal { account, .. } => Some(account),
            _ => None,
        }
    }
}

/// An immutable ledger entry. Once persisted it is never updated or
/// deleted; corrections happen through new compensating entries.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    /// Globally unique, generated before the first durable write.
    pub reference: String,
    pub kind: TransactionKind,
    /// Always positive; direction comes from `kind` and from which of
    /// source/destination is set, never from sign.
    pub amount: Money,
    pub currency: Currency,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub source: Option<AccountRef>,
    pub destination: Destination,
    /// Balance of the perspective account as committed in the same atomic
    /// unit that created this entry.
    pub balance_after: Money,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload the engine hands to the store's atomic commit; the store
/// assigns the id and timestamp on append.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub currency: Currency,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub source: Option<AccountRef>,
    pub destination: Destination,
    pub balance_after: Money,
    pub idempotency_key: Option<String>,
}

/// Read-only projection of an entry, computed relative to the account the
/// caller is viewing from.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub reference: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub currency: Currency,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub source_account_number: Option<String>,
    pub destination_account_number: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_bank: Option<String>,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
    pub is_credit: bool,
}

impl Transaction {
    /// True when the viewing account is the credited side.
    pub fn is_credit_for(&self, viewing: AccountId) -> bool {
        self.destination
            .internal_account()
            .is_some_and(|acc| acc.id == viewing)
    }

    pub fn view_from(&self, viewing: AccountId) -> TransactionView {
        let (destination_account_number, recipient_name, recipient_bank) =
            match &self.destination {
                Destination::None => (None, None, None),
                Destination::Internal {
                    account,
                    recipient_name,
                } => (Some(account.number.clone()), recipient_name.clone(), None),
                Destination::External(recipient) => (
                    Some(recipient.account_number.clone()),
                    recipient.name.clone(),
                    recipient.bank.clone(),
                ),
            };

        TransactionView {
            reference: self.reference.clone(),
            kind: self.kind,
            amount: self.amount,
            currency: self.currency,
            description: self.description.clone(),
            status: self.status,
            source_account_number: self.source.as_ref().map(|s| s.number.clone()),
            destination_account_number,
            recipient_name,
            recipient_bank,
            balance_after: self.balance_after,
            created_at: self.created_at,
            is_credit: self.is_credit_for(viewing),
        }
    }
}
