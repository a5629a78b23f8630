use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, HolderId, LotId, PurchaseId, SaleId};

/// Purchase lifecycle: `Created -> Reversed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Created,
    Reversed,
}

impl PurchaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseStatus::Created => "created",
            PurchaseStatus::Reversed => "reversed",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PurchaseStatus::Created),
            "reversed" => Ok(PurchaseStatus::Reversed),
            other => Err(format!("unknown purchase status: {other}")),
        }
    }
}

/// Sale lifecycle: `Allocated -> Reversed | Settled`. Both outcomes are
/// terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Allocated,
    Reversed,
    Settled,
}

impl SaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Allocated => "allocated",
            SaleStatus::Reversed => "reversed",
            SaleStatus::Settled => "settled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Reversed | SaleStatus::Settled)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allocated" => Ok(SaleStatus::Allocated),
            "reversed" => Ok(SaleStatus::Reversed),
            "settled" => Ok(SaleStatus::Settled),
            other => Err(format!("unknown sale status: {other}")),
        }
    }
}

/// Persisted purchase event. The lot it created is deleted on reversal but the
/// purchase row stays so a second reversal can be refused.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub lot_id: Option<LotId>,
    pub payment_account_id: AccountId,
    pub deposit_account_id: AccountId,
    pub foreign_amount: Decimal,
    pub unit_cost: Decimal,
    pub home_cost: Decimal,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

/// Persisted sale event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub foreign_account_id: AccountId,
    pub home_account_id: AccountId,
    /// Set when the proceeds were booked to a customer's receivable.
    pub customer_id: Option<HolderId>,
    pub foreign_amount: Decimal,
    pub home_proceeds: Decimal,
    pub realized_profit: Decimal,
    pub settled_amount: Decimal,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn outstanding(&self) -> Decimal {
        self.home_proceeds - self.settled_amount
    }
}
