use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use fxbook_core::{AccountId, AccountKind, CashAccount, Currency, HolderId, NewAccount};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::{
    EntryDraft, LedgerEntry, LedgerError, LedgerQuery, LedgerRepository, LedgerResult, LedgerType,
};

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cash_accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    holder_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    currency TEXT NOT NULL,
    kind TEXT NOT NULL,
    balance TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS cash_accounts_idx_currency_kind
    ON cash_accounts(currency, kind);
CREATE TABLE IF NOT EXISTS ledger_entries (
    sequence INTEGER PRIMARY KEY,
    entry_id TEXT NOT NULL UNIQUE,
    timestamp TEXT NOT NULL,
    account_id INTEGER NOT NULL REFERENCES cash_accounts(id),
    entry_type TEXT NOT NULL,
    amount TEXT NOT NULL,
    balance_before TEXT NOT NULL,
    balance_after TEXT NOT NULL,
    related_id TEXT NOT NULL,
    reverses TEXT,
    meta TEXT
);
CREATE INDEX IF NOT EXISTS ledger_idx_account_sequence
    ON ledger_entries(account_id, sequence);
CREATE INDEX IF NOT EXISTS ledger_idx_related
    ON ledger_entries(related_id);
CREATE TRIGGER IF NOT EXISTS ledger_entries_no_update
    BEFORE UPDATE ON ledger_entries
BEGIN
    SELECT RAISE(ABORT, 'ledger entries are append-only');
END;
CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete
    BEFORE DELETE ON ledger_entries
BEGIN
    SELECT RAISE(ABORT, 'ledger entries are append-only');
END;
"#;

const ACCOUNT_COLUMNS: &str =
    "id, holder_id, name, currency, kind, balance, is_active, version, created_at";

const ENTRY_COLUMNS: &str = "sequence, entry_id, timestamp, account_id, entry_type, amount, \
     balance_before, balance_after, related_id, reverses, meta";

/// Create the account and ledger tables if they do not exist yet.
pub fn initialize_schema(conn: &Connection) -> LedgerResult<()> {
    conn.execute_batch(LEDGER_SCHEMA)?;
    Ok(())
}

/// Open a connection configured the way every fxbook writer expects.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> LedgerResult<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
    )?;
    Ok(conn)
}

/// Fixed-width RFC 3339 so that stored timestamps sort lexicographically.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(raw: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| LedgerError::Serialization(format!("invalid timestamp {raw}: {err}")))
}

pub fn decode_decimal(raw: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {raw}: {err}")))
}

/// SQLite-backed read side used by reporting callers.
#[derive(Clone, Debug)]
pub struct SqliteLedgerRepository {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteLedgerRepository {
    pub fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let repo = Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        };
        repo.initialize_schema()?;
        Ok(repo)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn initialize_schema(&self) -> LedgerResult<()> {
        let conn = self.connect()?;
        initialize_schema(&conn)
    }

    fn connect(&self) -> LedgerResult<Connection> {
        open_connection(&self.path, self.busy_timeout)
    }
}

impl LedgerRepository for SqliteLedgerRepository {
    fn account(&self, account_id: AccountId) -> LedgerResult<CashAccount> {
        let conn = self.connect()?;
        load_account(&conn, account_id)
    }

    fn accounts(&self, currency: Option<&Currency>) -> LedgerResult<Vec<CashAccount>> {
        let conn = self.connect()?;
        load_accounts(&conn, currency)
    }

    fn latest_sequence(&self) -> LedgerResult<Option<u64>> {
        let conn = self.connect()?;
        latest_sequence(&conn)
    }

    fn query(&self, query: LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
        let conn = self.connect()?;
        query_entries(&conn, &query)
    }
}

/// Balance-writing half of the ledger. Borrowing a [`Transaction`] guarantees
/// the balance update and the entry it produces commit or roll back together
/// with whatever else the caller does in that transaction.
pub struct AccountLedger<'a> {
    conn: &'a Connection,
}

impl<'a> AccountLedger<'a> {
    pub fn new(tx: &'a Transaction<'_>) -> Self {
        Self { conn: tx }
    }

    pub fn open_account(&self, account: NewAccount) -> LedgerResult<CashAccount> {
        if account.name.trim().is_empty() {
            return Err(LedgerError::InvalidState(
                "account name must not be empty".into(),
            ));
        }
        self.conn.execute(
            "INSERT INTO cash_accounts (holder_id, name, currency, kind, balance, is_active, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6)",
            params![
                account.holder_id.get(),
                account.name.trim(),
                account.currency.code(),
                account.kind.as_str(),
                Decimal::ZERO.to_string(),
                encode_timestamp(Utc::now()),
            ],
        )?;
        let id = AccountId(self.conn.last_insert_rowid());
        load_account(self.conn, id)
    }

    pub fn account(&self, account_id: AccountId) -> LedgerResult<CashAccount> {
        load_account(self.conn, account_id)
    }

    /// Find the account of `kind` owned by `holder_id` in `currency`.
    pub fn find_account(
        &self,
        holder_id: HolderId,
        currency: &Currency,
        kind: AccountKind,
    ) -> LedgerResult<Option<CashAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM cash_accounts
             WHERE holder_id = ?1 AND currency = ?2 AND kind = ?3
             ORDER BY is_active DESC, id ASC LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![holder_id.get(), currency.code(), kind.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_account(row)?)),
            None => Ok(None),
        }
    }

    /// Read the current balance, apply `draft.amount`, persist the new
    /// balance and append the entry describing the change.
    pub fn apply_entry(&self, draft: EntryDraft) -> LedgerResult<LedgerEntry> {
        let account = self.account(draft.account_id)?;
        if !account.is_active {
            return Err(LedgerError::InactiveAccount(account.id));
        }
        let balance_after = account.balance + draft.amount;
        self.write_balance(&account, balance_after)?;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            sequence: self.next_sequence()?,
            timestamp: Utc::now(),
            account_id: account.id,
            entry_type: draft.entry_type,
            amount: draft.amount,
            balance_before: account.balance,
            balance_after,
            related_id: draft.related_id,
            reverses: draft.reverses,
            meta: draft.meta,
        };
        self.insert_entry(&entry)?;
        debug!(
            account_id = %entry.account_id,
            entry_type = %entry.entry_type,
            amount = %entry.amount,
            balance_after = %entry.balance_after,
            related_id = %entry.related_id,
            "ledger entry applied"
        );
        Ok(entry)
    }

    /// Append the inverse of `original` and apply it to the same account.
    pub fn compensate(
        &self,
        original: &LedgerEntry,
        related_id: impl Into<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.apply_entry(EntryDraft::compensating(original, related_id))
    }

    /// Reset a drifted balance column to `corrected` and record why. The entry
    /// has a zero signed amount because the ledger already explains
    /// `corrected`; `balance_before` keeps the drifted value for the audit
    /// trail.
    pub fn record_correction(
        &self,
        account_id: AccountId,
        corrected: Decimal,
        related_id: impl Into<String>,
        meta: serde_json::Value,
    ) -> LedgerResult<LedgerEntry> {
        let account = self.account(account_id)?;
        self.write_balance(&account, corrected)?;
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            sequence: self.next_sequence()?,
            timestamp: Utc::now(),
            account_id,
            entry_type: LedgerType::Adjustment,
            amount: Decimal::ZERO,
            balance_before: account.balance,
            balance_after: corrected,
            related_id: related_id.into(),
            reverses: None,
            meta: Some(meta),
        };
        self.insert_entry(&entry)?;
        Ok(entry)
    }

    /// Close an account. Only empty accounts can be closed.
    pub fn deactivate(&self, account_id: AccountId) -> LedgerResult<CashAccount> {
        let account = self.account(account_id)?;
        if !account.balance.is_zero() {
            return Err(LedgerError::InvalidState(format!(
                "account {account_id} still holds {} {}",
                account.balance, account.currency
            )));
        }
        let updated = self.conn.execute(
            "UPDATE cash_accounts SET is_active = 0, version = version + 1
             WHERE id = ?1 AND version = ?2",
            params![account.id.get(), account.version],
        )?;
        if updated == 0 {
            return Err(LedgerError::Conflict(format!(
                "account {account_id} changed while being deactivated"
            )));
        }
        self.account(account_id)
    }

    pub fn entries_for(&self, related_id: &str) -> LedgerResult<Vec<LedgerEntry>> {
        query_entries(self.conn, &LedgerQuery::default().with_related(related_id))
    }

    fn write_balance(&self, account: &CashAccount, balance: Decimal) -> LedgerResult<()> {
        let updated = self.conn.execute(
            "UPDATE cash_accounts SET balance = ?1, version = version + 1
             WHERE id = ?2 AND version = ?3",
            params![balance.to_string(), account.id.get(), account.version],
        )?;
        if updated == 0 {
            return Err(LedgerError::Conflict(format!(
                "account {} was modified concurrently (expected version {})",
                account.id, account.version
            )));
        }
        Ok(())
    }

    fn next_sequence(&self) -> LedgerResult<u64> {
        Ok(latest_sequence(self.conn)?.unwrap_or(0) + 1)
    }

    fn insert_entry(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO ledger_entries (
                sequence, entry_id, timestamp, account_id, entry_type, amount,
                balance_before, balance_after, related_id, reverses, meta
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.sequence as i64,
                entry.id.to_string(),
                encode_timestamp(entry.timestamp),
                entry.account_id.get(),
                entry.entry_type.as_str(),
                entry.amount.to_string(),
                entry.balance_before.to_string(),
                entry.balance_after.to_string(),
                entry.related_id,
                entry.reverses.map(|id| id.to_string()),
                entry.meta.as_ref().map(|value| value.to_string())
            ],
        )?;
        Ok(())
    }
}

pub fn load_account(conn: &Connection, account_id: AccountId) -> LedgerResult<CashAccount> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM cash_accounts WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![account_id.get()])?;
    match rows.next()? {
        Some(row) => row_to_account(row),
        None => Err(LedgerError::AccountNotFound(account_id)),
    }
}

pub fn load_accounts(
    conn: &Connection,
    currency: Option<&Currency>,
) -> LedgerResult<Vec<CashAccount>> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM cash_accounts
         WHERE (?1 IS NULL OR currency = ?1)
         ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![currency.map(|c| c.code().to_string())])?;
    let mut accounts = Vec::new();
    while let Some(row) = rows.next()? {
        accounts.push(row_to_account(row)?);
    }
    Ok(accounts)
}

pub fn latest_sequence(conn: &Connection) -> LedgerResult<Option<u64>> {
    let seq: Option<Option<i64>> = conn
        .query_row("SELECT MAX(sequence) FROM ledger_entries", [], |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()?;
    Ok(seq.flatten().map(|value| value as u64))
}

pub fn query_entries(conn: &Connection, query: &LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
    let mut sql = format!(
        "SELECT {ENTRY_COLUMNS}
         FROM ledger_entries
         WHERE (?1 IS NULL OR account_id = ?1)
           AND (?2 IS NULL OR entry_type = ?2)
           AND (?3 IS NULL OR related_id = ?3)
           AND (?4 IS NULL OR sequence >= ?4)
           AND (?5 IS NULL OR sequence <= ?5)
           AND (?6 IS NULL OR timestamp >= ?6)
           AND (?7 IS NULL OR timestamp <= ?7)"
    );
    sql.push_str(if query.ascending {
        " ORDER BY sequence ASC"
    } else {
        " ORDER BY sequence DESC"
    });
    sql.push_str(" LIMIT ?8 OFFSET ?9");

    let params: Vec<Value> = vec![
        query
            .account_id
            .map(|id| Value::Integer(id.get()))
            .unwrap_or(Value::Null),
        optional_text(query.entry_type.map(|t| t.as_str().to_string())),
        optional_text(query.related_id.clone()),
        optional_int(query.start_sequence),
        optional_int(query.end_sequence),
        optional_text(query.start_time.map(encode_timestamp)),
        optional_text(query.end_time.map(encode_timestamp)),
        Value::Integer(query.limit.map(|limit| limit as i64).unwrap_or(-1)),
        Value::Integer(query.offset.unwrap_or(0) as i64),
    ];

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(row_to_entry(row)?);
    }
    Ok(entries)
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn optional_int(value: Option<u64>) -> Value {
    value
        .map(|v| Value::Integer(v as i64))
        .unwrap_or(Value::Null)
}

fn row_to_account(row: &rusqlite::Row<'_>) -> LedgerResult<CashAccount> {
    let id: i64 = row.get(0)?;
    let holder_id: i64 = row.get(1)?;
    let name: String = row.get(2)?;
    let currency_str: String = row.get(3)?;
    let kind_str: String = row.get(4)?;
    let balance_str: String = row.get(5)?;
    let is_active: bool = row.get(6)?;
    let version: i64 = row.get(7)?;
    let created_at_str: String = row.get(8)?;

    let currency = Currency::from_str(&currency_str).map_err(LedgerError::Serialization)?;
    let kind = AccountKind::from_str(&kind_str).map_err(LedgerError::Serialization)?;
    Ok(CashAccount {
        id: AccountId(id),
        holder_id: HolderId(holder_id),
        name,
        currency,
        kind,
        balance: decode_decimal(&balance_str)?,
        is_active,
        version,
        created_at: decode_timestamp(&created_at_str)?,
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> LedgerResult<LedgerEntry> {
    let sequence: i64 = row.get(0)?;
    let entry_id: String = row.get(1)?;
    let timestamp_str: String = row.get(2)?;
    let account_id: i64 = row.get(3)?;
    let entry_type_str: String = row.get(4)?;
    let amount_str: String = row.get(5)?;
    let before_str: String = row.get(6)?;
    let after_str: String = row.get(7)?;
    let related_id: String = row.get(8)?;
    let reverses_str: Option<String> = row.get(9)?;
    let meta_value: Option<String> = row.get(10)?;

    let entry_type = LedgerType::from_str(&entry_type_str).map_err(LedgerError::Serialization)?;
    let reverses = match reverses_str {
        Some(raw) => Some(parse_uuid(&raw)?),
        None => None,
    };
    let meta = if let Some(json) = meta_value {
        Some(serde_json::from_str(&json).map_err(|err| {
            LedgerError::Serialization(format!("invalid ledger meta payload: {err}"))
        })?)
    } else {
        None
    };

    Ok(LedgerEntry {
        id: parse_uuid(&entry_id)?,
        sequence: sequence as u64,
        timestamp: decode_timestamp(&timestamp_str)?,
        account_id: AccountId(account_id),
        entry_type,
        amount: decode_decimal(&amount_str)?,
        balance_before: decode_decimal(&before_str)?,
        balance_after: decode_decimal(&after_str)?,
        related_id,
        reverses,
        meta,
    })
}

fn parse_uuid(raw: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid ledger id {raw}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::replay_balance;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tempfile::tempdir;

    fn open(dir: &Path) -> Connection {
        let conn = open_connection(&dir.join("ledger.db"), Duration::from_secs(1)).unwrap();
        initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn apply_entry_tracks_balances() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        let tx = conn.transaction().unwrap();
        let ledger = AccountLedger::new(&tx);
        let account = ledger
            .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
            .unwrap();
        let first = ledger
            .apply_entry(EntryDraft::new(
                account.id,
                LedgerType::Deposit,
                dec!(100),
                "dep-1",
            ))
            .unwrap();
        let second = ledger
            .apply_entry(EntryDraft::new(
                account.id,
                LedgerType::Withdraw,
                dec!(-30.5),
                "wd-1",
            ))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(first.balance_before, Decimal::ZERO);
        assert_eq!(second.balance_before, dec!(100));
        assert_eq!(second.balance_after, dec!(69.5));
        assert_eq!(second.sequence, first.sequence + 1);

        let entries = query_entries(&conn, &LedgerQuery::for_account(account.id)).unwrap();
        assert_eq!(replay_balance(&entries), dec!(69.5));
        assert_eq!(load_account(&conn, account.id).unwrap().balance, dec!(69.5));
    }

    #[test]
    fn compensating_entry_points_at_original() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        let tx = conn.transaction().unwrap();
        let ledger = AccountLedger::new(&tx);
        let profit = ledger
            .open_account(NewAccount::profit(HolderId(0), "profit", Currency::from("TWD")))
            .unwrap();
        let earned = ledger
            .apply_entry(EntryDraft::new(
                profit.id,
                LedgerType::ProfitEarned,
                dec!(360),
                "sale:1",
            ))
            .unwrap();
        let reversal = ledger.compensate(&earned, "sale:1").unwrap();
        assert_eq!(reversal.entry_type, LedgerType::ProfitWithdraw);
        assert_eq!(reversal.amount, dec!(-360));
        assert_eq!(reversal.reverses, Some(earned.id));
        assert_eq!(reversal.balance_after, Decimal::ZERO);
        assert_eq!(ledger.entries_for("sale:1").unwrap().len(), 2);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        let tx = conn.transaction().unwrap();
        let ledger = AccountLedger::new(&tx);
        let account = ledger
            .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
            .unwrap();
        ledger
            .apply_entry(EntryDraft::new(account.id, LedgerType::Deposit, dec!(1), "d"))
            .unwrap();
        let err = ledger.write_balance(&account, dec!(5)).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn entries_are_append_only() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        {
            let tx = conn.transaction().unwrap();
            let ledger = AccountLedger::new(&tx);
            let account = ledger
                .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
                .unwrap();
            ledger
                .apply_entry(EntryDraft::new(account.id, LedgerType::Deposit, dec!(1), "d"))
                .unwrap();
            tx.commit().unwrap();
        }
        assert!(conn
            .execute("UPDATE ledger_entries SET amount = '2'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM ledger_entries", []).is_err());
    }

    #[test]
    fn correction_keeps_replay_intact() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        let tx = conn.transaction().unwrap();
        let ledger = AccountLedger::new(&tx);
        let account = ledger
            .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
            .unwrap();
        ledger
            .apply_entry(EntryDraft::new(account.id, LedgerType::Deposit, dec!(50), "d"))
            .unwrap();
        tx.execute(
            "UPDATE cash_accounts SET balance = '75' WHERE id = ?1",
            params![account.id.get()],
        )
        .unwrap();
        let fix = ledger
            .record_correction(account.id, dec!(50), "repair", json!({ "reason": "test" }))
            .unwrap();
        assert_eq!(fix.balance_before, dec!(75));
        assert_eq!(fix.balance_after, dec!(50));
        assert!(fix.amount.is_zero());
        let entries = query_entries(&tx, &LedgerQuery::for_account(account.id)).unwrap();
        assert_eq!(replay_balance(&entries), ledger.account(account.id).unwrap().balance);
    }

    #[test]
    fn deactivate_requires_empty_balance() {
        let dir = tempdir().unwrap();
        let mut conn = open(dir.path());
        let tx = conn.transaction().unwrap();
        let ledger = AccountLedger::new(&tx);
        let account = ledger
            .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
            .unwrap();
        ledger
            .apply_entry(EntryDraft::new(account.id, LedgerType::Deposit, dec!(5), "d"))
            .unwrap();
        assert!(ledger.deactivate(account.id).is_err());
        ledger
            .apply_entry(EntryDraft::new(account.id, LedgerType::Withdraw, dec!(-5), "w"))
            .unwrap();
        let closed = ledger.deactivate(account.id).unwrap();
        assert!(!closed.is_active);
        let err = ledger
            .apply_entry(EntryDraft::new(account.id, LedgerType::Deposit, dec!(1), "d2"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InactiveAccount(_)));
    }

    #[test]
    fn repository_query_filters_and_pages() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        let repo = SqliteLedgerRepository::new(&db_path).unwrap();
        let mut conn = open_connection(&db_path, Duration::from_secs(1)).unwrap();
        let account_id = {
            let tx = conn.transaction().unwrap();
            let ledger = AccountLedger::new(&tx);
            let account = ledger
                .open_account(NewAccount::cash(HolderId(1), "main", Currency::from("TWD")))
                .unwrap();
            for i in 1..=5 {
                ledger
                    .apply_entry(EntryDraft::new(
                        account.id,
                        LedgerType::Deposit,
                        Decimal::from(i),
                        format!("dep-{i}"),
                    ))
                    .unwrap();
            }
            tx.commit().unwrap();
            account.id
        };

        let latest = repo
            .query(LedgerQuery::for_account(account_id).descending().with_limit(1))
            .unwrap();
        assert_eq!(latest[0].related_id, "dep-5");
        let related = repo
            .query(LedgerQuery::default().with_related("dep-2"))
            .unwrap();
        assert_eq!(related.len(), 1);

        let page = repo.history(account_id, 2, 2).unwrap();
        assert_eq!(page.total_entries, 5);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.lines.len(), 2);
        assert_eq!(page.lines[0].running_balance, dec!(6));
        assert_eq!(page.lines[1].running_balance, dec!(10));
        assert_eq!(repo.latest_sequence().unwrap(), Some(5));
    }
}
