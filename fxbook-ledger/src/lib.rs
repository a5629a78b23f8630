//! Account balances and the append-only entry ledger that explains them.

mod entry;
mod error;
pub mod history;
mod query;
mod repository;
mod sqlite;

pub use entry::{EntryDraft, LedgerEntry, LedgerType};
pub use error::{LedgerError, LedgerResult};
pub use history::{HistoryLine, LedgerPage};
pub use query::LedgerQuery;
pub use repository::LedgerRepository;
pub use sqlite::{
    decode_decimal, decode_timestamp, encode_timestamp, initialize_schema, latest_sequence,
    load_account, load_accounts, open_connection, query_entries, AccountLedger,
    SqliteLedgerRepository,
};
