use chrono::{DateTime, Utc};
use fxbook_core::{AccountId, CashAccount, Currency};
use rust_decimal::Decimal;

use crate::{history, LedgerEntry, LedgerPage, LedgerQuery, LedgerResult};

/// Read side of durable ledger storage.
///
/// Writes never go through this trait: they happen inside an engine
/// transaction via [`AccountLedger`](crate::AccountLedger) so that balances,
/// entries and inventory commit together.
pub trait LedgerRepository: Send + Sync {
    /// Load a single account.
    fn account(&self, account_id: AccountId) -> LedgerResult<CashAccount>;

    /// Load accounts, optionally restricted to one currency.
    fn accounts(&self, currency: Option<&Currency>) -> LedgerResult<Vec<CashAccount>>;

    /// Read the latest persisted sequence value.
    fn latest_sequence(&self) -> LedgerResult<Option<u64>>;

    /// Load entries matching the supplied query.
    fn query(&self, query: LedgerQuery) -> LedgerResult<Vec<LedgerEntry>>;

    /// Balance of `account_id` as explained by entries stamped at or before
    /// `as_of`.
    fn running_balance(
        &self,
        account_id: AccountId,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<Decimal> {
        let entries = self.query(
            LedgerQuery::for_account(account_id).with_time_range(None, Some(as_of)),
        )?;
        Ok(history::replay_balance(&entries))
    }

    /// One page of the account's chronological history with running balances.
    fn history(
        &self,
        account_id: AccountId,
        page: usize,
        page_size: usize,
    ) -> LedgerResult<LedgerPage> {
        self.account(account_id)?;
        let entries = self.query(LedgerQuery::for_account(account_id))?;
        Ok(history::paginate(account_id, entries, page, page_size))
    }
}
