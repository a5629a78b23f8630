use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fxbook_config::{DatabaseConfig, EngineConfig};
use fxbook_ledger::{initialize_schema, open_connection};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::{EngineError, EngineResult};

const ENGINE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS purchases (
    id INTEGER PRIMARY KEY,
    lot_id INTEGER,
    payment_account_id INTEGER NOT NULL REFERENCES cash_accounts(id),
    deposit_account_id INTEGER NOT NULL REFERENCES cash_accounts(id),
    foreign_amount TEXT NOT NULL,
    unit_cost TEXT NOT NULL,
    home_cost TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS lots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    purchase_id INTEGER NOT NULL UNIQUE,
    currency TEXT NOT NULL,
    original_amount TEXT NOT NULL,
    remaining_amount TEXT NOT NULL,
    adjusted_amount TEXT NOT NULL,
    unit_cost TEXT NOT NULL,
    acquired_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS lots_idx_currency_acquired
    ON lots(currency, acquired_at, id);
CREATE TABLE IF NOT EXISTS sales (
    id INTEGER PRIMARY KEY,
    foreign_account_id INTEGER NOT NULL REFERENCES cash_accounts(id),
    home_account_id INTEGER NOT NULL REFERENCES cash_accounts(id),
    customer_id INTEGER,
    foreign_amount TEXT NOT NULL,
    home_proceeds TEXT NOT NULL,
    realized_profit TEXT NOT NULL,
    settled_amount TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS sales_idx_customer_status
    ON sales(customer_id, status);
CREATE TABLE IF NOT EXISTS allocations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lot_id INTEGER NOT NULL,
    sale_id INTEGER NOT NULL REFERENCES sales(id),
    allocated_amount TEXT NOT NULL,
    allocated_cost TEXT NOT NULL,
    realized_profit TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    reversed_at TEXT
);
CREATE INDEX IF NOT EXISTS allocations_idx_sale ON allocations(sale_id);
CREATE INDEX IF NOT EXISTS allocations_idx_lot ON allocations(lot_id, status);
"#;

/// Owns the SQLite file shared by the ledger and the inventory tables.
///
/// Every write runs in its own `BEGIN IMMEDIATE` transaction, so writers are
/// serialized by the database and a failed closure rolls everything back.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl SqliteStore {
    pub fn open(database: &DatabaseConfig, engine: &EngineConfig) -> EngineResult<Self> {
        let store = Self {
            path: database.path.clone(),
            busy_timeout: Duration::from_millis(database.busy_timeout_ms),
            max_retries: engine.max_retries,
            retry_backoff: Duration::from_millis(engine.retry_backoff_ms),
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    fn initialize(&self) -> EngineResult<()> {
        let conn = self.connect()?;
        initialize_schema(&conn)?;
        conn.execute_batch(ENGINE_SCHEMA)?;
        Ok(())
    }

    pub(crate) fn connect(&self) -> EngineResult<Connection> {
        Ok(open_connection(&self.path, self.busy_timeout)?)
    }

    /// Run `work` against a plain connection. Nothing is written.
    pub fn read<T, F>(&self, work: F) -> EngineResult<T>
    where
        F: FnOnce(&Connection) -> EngineResult<T>,
    {
        let conn = self.connect()?;
        work(&conn)
    }

    /// Run `work` inside an immediate transaction, retrying conflicts with a
    /// linear backoff until `max_retries` is exhausted.
    pub fn write<T, F>(&self, operation: &str, mut work: F) -> EngineResult<T>
    where
        F: FnMut(&Transaction<'_>) -> EngineResult<T>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_write(&mut work) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        "write conflict detected; retrying"
                    );
                    thread::sleep(self.retry_backoff * attempt);
                }
                Err(err) if err.is_retryable() => {
                    return Err(EngineError::ConcurrencyConflict(format!(
                        "{operation} gave up after {attempt} attempts: {err}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn try_write<T, F>(&self, work: &mut F) -> EngineResult<T>
    where
        F: FnMut(&Transaction<'_>) -> EngineResult<T>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
