#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use fxbook_config::{AppConfig, DatabaseConfig};
use fxbook_core::{AccountId, Currency, HolderId, NewAccount, PurchaseId, SaleId};
use fxbook_engine::{
    AllocationResult, EngineResult, FxBook, PurchaseRequest, PurchaseResult, SaleRequest,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

pub const OWNER: HolderId = HolderId(1);
pub const STARTING_TWD: Decimal = dec!(1000000);

/// A freshly opened book with one TWD and one RMB cash account.
pub struct Desk {
    pub book: FxBook,
    pub twd_cash: AccountId,
    pub rmb_cash: AccountId,
    pub config: AppConfig,
    dir: TempDir,
}

impl Desk {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig {
            database: DatabaseConfig::in_dir(dir.path()),
            ..AppConfig::default()
        };
        config.engine.retry_backoff_ms = 1;
        config.engine.max_retries = 20;
        let book = FxBook::open(&config).expect("open book");
        let twd_cash = book
            .open_account(NewAccount::cash(OWNER, "TWD till", twd()))
            .expect("twd account")
            .id;
        let rmb_cash = book
            .open_account(NewAccount::cash(OWNER, "RMB till", rmb()))
            .expect("rmb account")
            .id;
        book.deposit(twd_cash, STARTING_TWD, Some("opening float"))
            .expect("float");
        Self {
            book,
            twd_cash,
            rmb_cash,
            config,
            dir,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("fxbook.db")
    }

    pub fn buy(
        &self,
        id: i64,
        amount: Decimal,
        unit_cost: Decimal,
        acquired_at: DateTime<Utc>,
    ) -> PurchaseResult {
        self.try_buy(id, amount, unit_cost, acquired_at)
            .expect("purchase")
    }

    pub fn try_buy(
        &self,
        id: i64,
        amount: Decimal,
        unit_cost: Decimal,
        acquired_at: DateTime<Utc>,
    ) -> EngineResult<PurchaseResult> {
        self.book.on_purchase_created(PurchaseRequest {
            purchase_id: PurchaseId(id),
            foreign_amount: amount,
            unit_cost,
            payment_account_id: self.twd_cash,
            deposit_account_id: self.rmb_cash,
            acquired_at: Some(acquired_at),
        })
    }

    pub fn sell(&self, id: i64, amount: Decimal, proceeds: Decimal) -> EngineResult<AllocationResult> {
        self.sell_to(id, amount, proceeds, self.twd_cash)
    }

    pub fn sell_to(
        &self,
        id: i64,
        amount: Decimal,
        proceeds: Decimal,
        home_account: AccountId,
    ) -> EngineResult<AllocationResult> {
        self.book.on_sale_created(SaleRequest {
            sale_id: SaleId(id),
            requested_foreign: amount,
            home_proceeds: proceeds,
            foreign_account_id: self.rmb_cash,
            home_account_id: home_account,
        })
    }

    pub fn balance(&self, account: AccountId) -> Decimal {
        self.book.account_balance(account).expect("balance")
    }

    pub fn assert_reconciled(&self) {
        for currency in [rmb(), twd()] {
            let report = self.book.check_consistency(&currency).expect("check");
            assert!(
                report.is_consistent(),
                "{currency} not reconciled: {report:#?}"
            );
        }
    }
}

pub fn twd() -> Currency {
    Currency::from("TWD")
}

pub fn rmb() -> Currency {
    Currency::from("RMB")
}

/// Fixed acquisition clock: `t(n)` is `n` minutes after a reference instant.
pub fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}
