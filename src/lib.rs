//! Ledger core: account balances with an immutable audit trail.
//!
//! The [`engine::Engine`] orchestrates deposits, withdrawals, and
//! transfers against stores implementing the [`domain::AtomicStore`]
//! contract, which guarantees that the balance mutation(s) and the ledger
//! entry of one operation persist together or not at all.

pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod memory_store;
pub mod reference;

pub use engine::{DepositRequest, Engine, TransferRequest, WithdrawRequest};
pub use memory_store::InMemoryStore;
