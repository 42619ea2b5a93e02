pub mod account;
pub mod error;
pub mod guard;
pub mod money;
pub mod traits;
pub mod transaction;

pub use account::{Account, AccountId, AccountKind, AccountStatus, UserId};
pub use error::{Error, StoreError};
pub use money::{Currency, Money};
pub use traits::{AccountStore, AtomicStore, BalanceUpdate, LedgerStore, Page};
pub use transaction::{
    AccountRef, Destination, ExternalRecipient, NewTransaction, Transaction, TransactionId,
    TransactionKind, TransactionStatus, TransactionView,
};
