use chrono::{DateTime, Utc};
use fxbook_core::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical ledger record describing a single balance delta on one account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub account_id: AccountId,
    pub entry_type: LedgerType,
    /// Signed change applied to the account. Repair corrections carry zero.
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    /// Sale, purchase, allocation or settlement this entry belongs to.
    pub related_id: String,
    /// Entry this one compensates, for reversals.
    pub reverses: Option<Uuid>,
    pub meta: Option<serde_json::Value>,
}

impl LedgerEntry {
    pub fn is_compensating(&self) -> bool {
        self.reverses.is_some()
    }
}

/// Everything the caller decides about a new entry; the ledger fills in the
/// balances, sequence and timestamp.
#[derive(Clone, Debug)]
pub struct EntryDraft {
    pub account_id: AccountId,
    pub entry_type: LedgerType,
    pub amount: Decimal,
    pub related_id: String,
    pub reverses: Option<Uuid>,
    pub meta: Option<serde_json::Value>,
}

impl EntryDraft {
    pub fn new(
        account_id: AccountId,
        entry_type: LedgerType,
        amount: Decimal,
        related_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            entry_type,
            amount,
            related_id: related_id.into(),
            reverses: None,
            meta: None,
        }
    }

    /// Draft the exact inverse of `original`.
    pub fn compensating(original: &LedgerEntry, related_id: impl Into<String>) -> Self {
        Self {
            account_id: original.account_id,
            entry_type: original.entry_type.compensating(),
            amount: -original.amount,
            related_id: related_id.into(),
            reverses: Some(original.id),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Enumerates the supported ledger line item categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerType {
    Purchase,
    Sale,
    Settlement,
    TransferIn,
    TransferOut,
    ProfitEarned,
    ProfitWithdraw,
    Adjustment,
    Deposit,
    Withdraw,
}

impl LedgerType {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerType::Purchase => "PURCHASE",
            LedgerType::Sale => "SALE",
            LedgerType::Settlement => "SETTLEMENT",
            LedgerType::TransferIn => "TRANSFER_IN",
            LedgerType::TransferOut => "TRANSFER_OUT",
            LedgerType::ProfitEarned => "PROFIT_EARNED",
            LedgerType::ProfitWithdraw => "PROFIT_WITHDRAW",
            LedgerType::Adjustment => "ADJUSTMENT",
            LedgerType::Deposit => "DEPOSIT",
            LedgerType::Withdraw => "WITHDRAW",
        }
    }

    /// Type used when appending the inverse of an entry of this type.
    pub fn compensating(self) -> Self {
        match self {
            LedgerType::ProfitEarned => LedgerType::ProfitWithdraw,
            LedgerType::TransferIn => LedgerType::TransferOut,
            LedgerType::TransferOut => LedgerType::TransferIn,
            other => other,
        }
    }
}

impl fmt::Display for LedgerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(LedgerType::Purchase),
            "SALE" => Ok(LedgerType::Sale),
            "SETTLEMENT" => Ok(LedgerType::Settlement),
            "TRANSFER_IN" => Ok(LedgerType::TransferIn),
            "TRANSFER_OUT" => Ok(LedgerType::TransferOut),
            "PROFIT_EARNED" => Ok(LedgerType::ProfitEarned),
            "PROFIT_WITHDRAW" => Ok(LedgerType::ProfitWithdraw),
            "ADJUSTMENT" => Ok(LedgerType::Adjustment),
            "DEPOSIT" => Ok(LedgerType::Deposit),
            "WITHDRAW" => Ok(LedgerType::Withdraw),
            other => Err(format!("unknown ledger type: {other}")),
        }
    }
}
