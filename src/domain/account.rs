use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::Error;
use crate::domain::money::{Currency, Money};

/// Store-assigned account identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of the principal that owns an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountKind {
    Checking,
    Savings,
    Business,
    Investment,
}

/// Account lifecycle status. `Closed` is terminal and only reachable at a
/// zero balance; `Active` and `Frozen` convert freely between each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Frozen => "FROZEN",
            AccountStatus::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// A customer account. The balance is mutated only by the money movement
/// engine, through the store's atomic commit; everything the engine reads
/// is a versioned snapshot, and `version` is what the commit checks.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    /// Assigned exactly once, at first persist. Never reused.
    pub number: String,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Money,
    pub currency: Currency,
    pub status: AccountStatus,
    pub owner: UserId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn freeze(&mut self) -> Result<(), Error> {
        match self.status {
            AccountStatus::Active => {
                self.status = AccountStatus::Frozen;
                Ok(())
            }
            AccountStatus::Frozen => Ok(()),
            AccountStatus::Closed => Err(Error::invalid_state("account is closed")),
        }
    }

    pub fn unfreeze(&mut self) -> Result<(), Error> {
        match self.status {
            AccountStatus::Frozen => {
                self.status = AccountStatus::Active;
                Ok(())
            }
            AccountStatus::Active => Ok(()),
            AccountStatus::Closed => Err(Error::invalid_state("account is closed")),
        }
    }

    /// Close the account. Requires a zero balance; closing is terminal.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.status == AccountStatus::Closed {
            return Err(Error::invalid_state("account is already closed"));
        }
        if !self.balance.is_zero() {
            return Err(Error::invalid_state(
                "account balance must be zero before closing",
            ));
        }
        self.status = AccountStatus::Closed;
        Ok(())
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
