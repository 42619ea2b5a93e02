use crate::domain::account::{Account, UserId};
use crate::domain::error::Error;

/// Ownership check applied to every account being debited (and to
/// owner-scoped reads). Credit-only destinations are never guarded.
pub fn ensure_owner(account: &Account, principal: UserId) -> Result<(), Error> {
    if account.owner == principal {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "user {} does not own account {}",
            principal, account.id
        )))
    }
}
