use crate::domain::account::AccountId;

/// Failure kinds surfaced to callers of the engine.
///
/// Every check runs before any durable write, so an error implies no
/// mutation happened, with one internal exception: a generated reference
/// colliding in the store is regenerated and retried without surfacing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient funds in account {account}")]
    InsufficientFunds { account: AccountId },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Adapter-level failures reported by store implementations.
///
/// The engine maps these to caller-facing [`Error`] kinds; the version and
/// uniqueness variants additionally drive its retry decisions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The expected version no longer matches; the snapshot is stale.
    #[error("stale version for account {0}")]
    StaleVersion(AccountId),

    #[error("account {0} not found")]
    MissingAccount(AccountId),

    #[error("duplicate account number {0}")]
    DuplicateAccountNumber(String),

    #[error("duplicate transaction reference {0}")]
    DuplicateReference(String),

    #[error("duplicate idempotency key {0}")]
    DuplicateIdempotencyKey(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StaleVersion(id) => {
                Error::Conflict(format!("concurrent update on account {}", id))
            }
            StoreError::MissingAccount(id) => Error::not_found(format!("account {}", id)),
            StoreError::DuplicateAccountNumber(n) => {
                Error::Conflict(format!("account number {} already exists", n))
            }
            StoreError::DuplicateReference(r) => {
                Error::Conflict(format!("reference {} already exists", r))
            }
            StoreError::DuplicateIdempotencyKey(k) => {
                Error::Conflict(format!("idempotency key {} already used", k))
            }
            StoreError::Unavailable(msg) => Error::Unavailable(msg),
        }
    }
}
