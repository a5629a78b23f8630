use chrono::{DateTime, Utc};
use fxbook_core::AccountId;

use crate::LedgerType;

/// Filter describing which ledger entries to load from storage.
#[derive(Clone, Debug)]
pub struct LedgerQuery {
    pub account_id: Option<AccountId>,
    pub entry_type: Option<LedgerType>,
    pub related_id: Option<String>,
    pub start_sequence: Option<u64>,
    pub end_sequence: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub ascending: bool,
}

impl Default for LedgerQuery {
    fn default() -> Self {
        Self {
            account_id: None,
            entry_type: None,
            related_id: None,
            start_sequence: None,
            end_sequence: None,
            start_time: None,
            end_time: None,
            limit: None,
            offset: None,
            ascending: true,
        }
    }
}

impl LedgerQuery {
    pub fn for_account(account_id: AccountId) -> Self {
        Self::default().with_account(account_id)
    }

    pub fn with_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_related(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }
}
