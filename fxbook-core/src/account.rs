use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Currency, HolderId};

/// What an account's balance represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Money actually held. Foreign-currency cash must match lot inventory.
    Cash,
    /// What a customer owes the desk, in the home currency.
    Receivable,
    /// Realized profit, tracked separately from the cash it arrived in.
    Profit,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Cash => "cash",
            AccountKind::Receivable => "receivable",
            AccountKind::Profit => "profit",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(AccountKind::Cash),
            "receivable" => Ok(AccountKind::Receivable),
            "profit" => Ok(AccountKind::Profit),
            other => Err(format!("unknown account kind: {other}")),
        }
    }
}

/// Balance holder for one (holder, currency, kind) triple.
///
/// `balance` is a cache of the ledger fold and is only written together with
/// the entry that explains the change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CashAccount {
    pub id: AccountId,
    pub holder_id: HolderId,
    pub name: String,
    pub currency: Currency,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl CashAccount {
    pub fn is_cash(&self) -> bool {
        self.kind == AccountKind::Cash
    }
}

/// Parameters for opening a new account.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub holder_id: HolderId,
    pub name: String,
    pub currency: Currency,
    pub kind: AccountKind,
}

impl NewAccount {
    pub fn cash(holder_id: HolderId, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            holder_id,
            name: name.into(),
            currency,
            kind: AccountKind::Cash,
        }
    }

    pub fn receivable(holder_id: HolderId, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            holder_id,
            name: name.into(),
            currency,
            kind: AccountKind::Receivable,
        }
    }

    pub fn profit(holder_id: HolderId, name: impl Into<String>, currency: Currency) -> Self {
        Self {
            holder_id,
            name: name.into(),
            currency,
            kind: AccountKind::Profit,
        }
    }
}
