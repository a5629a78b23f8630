use fxbook_core::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::LedgerEntry;

/// One ledger line with the balance obtained by folding every earlier entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryLine {
    pub entry: LedgerEntry,
    pub running_balance: Decimal,
}

/// Page of an account's ledger in chronological order. Pages start at 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerPage {
    pub account_id: AccountId,
    pub page: usize,
    pub page_size: usize,
    pub total_entries: usize,
    pub lines: Vec<HistoryLine>,
}

impl LedgerPage {
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        self.total_entries.div_ceil(self.page_size)
    }
}

/// Sum of signed amounts, i.e. the balance the entries explain.
pub fn replay_balance<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Decimal {
    entries
        .into_iter()
        .fold(Decimal::ZERO, |acc, entry| acc + entry.amount)
}

/// Attach running balances to entries that are already in sequence order.
pub fn running_lines(entries: Vec<LedgerEntry>) -> Vec<HistoryLine> {
    let mut balance = Decimal::ZERO;
    entries
        .into_iter()
        .map(|entry| {
            balance += entry.amount;
            HistoryLine {
                entry,
                running_balance: balance,
            }
        })
        .collect()
}

/// Slice a full chronological history into the requested page.
pub fn paginate(
    account_id: AccountId,
    entries: Vec<LedgerEntry>,
    page: usize,
    page_size: usize,
) -> LedgerPage {
    let page = page.max(1);
    let total_entries = entries.len();
    let start = (page - 1).saturating_mul(page_size);
    let lines = running_lines(entries)
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();
    LedgerPage {
        account_id,
        page,
        page_size,
        total_entries,
        lines,
    }
}
