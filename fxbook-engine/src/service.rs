use chrono::{DateTime, Utc};
use fxbook_config::AppConfig;
use fxbook_core::{
    AccountId, AccountKind, Allocation, CashAccount, Currency, HolderId, Lot, LotId, NewAccount,
    Purchase, PurchaseId, Sale, SaleId,
};
use fxbook_ledger::{
    AccountLedger, LedgerEntry, LedgerPage, LedgerRepository, SqliteLedgerRepository,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::adjustment::{adjust_inventory, AdjustmentResult};
use crate::allocator::{AllocationResult, FifoAllocator, SaleRequest};
use crate::cash;
use crate::lots::{InventorySummary, LotStore};
use crate::purchase::{book_purchase, PurchaseRequest, PurchaseResult};
use crate::reconcile::{DiscrepancyReport, ReconciliationChecker, RepairReport};
use crate::records::RecordStore;
use crate::reversal::{ReversalCoordinator, ReversalResult};
use crate::settlement::{settle, SettlementResult};
use crate::store::SqliteStore;
use crate::{BookContext, EngineError, EngineResult};

/// Holder that owns the desk's own profit account.
pub const DESK_HOLDER: HolderId = HolderId(0);

/// Entry point for the surrounding application: event hooks on the write
/// side, reporting queries on the read side.
#[derive(Clone, Debug)]
pub struct FxBook {
    store: SqliteStore,
    ledger: SqliteLedgerRepository,
    ctx: BookContext,
}

impl FxBook {
    pub fn open(config: &AppConfig) -> EngineResult<Self> {
        config
            .validate()
            .map_err(|err| EngineError::Validation(err.to_string()))?;
        let store = SqliteStore::open(&config.database, &config.engine)?;
        let ledger =
            SqliteLedgerRepository::new(store.path())?.with_busy_timeout(store.busy_timeout());
        let home = config.engine.home_currency.clone();
        let profit_account = store.write("ensure_profit_account", |tx| {
            let ledger = AccountLedger::new(tx);
            if let Some(existing) = ledger.find_account(DESK_HOLDER, &home, AccountKind::Profit)? {
                return Ok(existing.id);
            }
            let account =
                ledger.open_account(NewAccount::profit(DESK_HOLDER, "realized profit", home.clone()))?;
            info!(account_id = %account.id, currency = %home, "profit account created");
            Ok(account.id)
        })?;
        Ok(Self {
            store,
            ledger,
            ctx: BookContext::new(config.engine.clone(), profit_account),
        })
    }

    pub fn context(&self) -> &BookContext {
        &self.ctx
    }

    pub fn profit_account_id(&self) -> AccountId {
        self.ctx.profit_account
    }

    pub fn open_account(&self, account: NewAccount) -> EngineResult<CashAccount> {
        if account.kind == AccountKind::Profit {
            return Err(EngineError::Validation(
                "the profit account is managed by the engine".into(),
            ));
        }
        let allowed = [self.ctx.home_currency(), self.ctx.foreign_currency()];
        if !allowed.contains(&&account.currency) {
            return Err(EngineError::Validation(format!(
                "currency {} is not traded here",
                account.currency
            )));
        }
        if account.kind == AccountKind::Receivable && &account.currency != self.ctx.home_currency()
        {
            return Err(EngineError::Validation(
                "receivables are kept in the home currency".into(),
            ));
        }
        self.store.write("open_account", |tx| {
            let ledger = AccountLedger::new(tx);
            if account.kind == AccountKind::Receivable
                && ledger
                    .find_account(account.holder_id, &account.currency, AccountKind::Receivable)?
                    .is_some()
            {
                return Err(EngineError::Validation(format!(
                    "holder {} already has a receivable account",
                    account.holder_id
                )));
            }
            Ok(ledger.open_account(account.clone())?)
        })
    }

    pub fn deactivate_account(&self, account_id: AccountId) -> EngineResult<CashAccount> {
        if account_id == self.ctx.profit_account {
            return Err(EngineError::Validation(
                "the profit account cannot be deactivated".into(),
            ));
        }
        self.store.write("deactivate_account", |tx| {
            let live = RecordStore::new(tx).live_references(account_id)?;
            if live > 0 {
                return Err(EngineError::Validation(format!(
                    "account {account_id} is still used by {live} reversible purchases or sales"
                )));
            }
            Ok(AccountLedger::new(tx).deactivate(account_id)?)
        })
    }

    pub fn on_purchase_created(&self, request: PurchaseRequest) -> EngineResult<PurchaseResult> {
        self.store
            .write("purchase", |tx| book_purchase(tx, &self.ctx, &request))
    }

    pub fn on_purchase_deleted(&self, purchase_id: PurchaseId) -> EngineResult<ReversalResult> {
        self.store.write("reverse_purchase", |tx| {
            ReversalCoordinator.reverse_purchase(tx, purchase_id)
        })
    }

    pub fn on_sale_created(&self, request: SaleRequest) -> EngineResult<AllocationResult> {
        let allocator = FifoAllocator::new(&self.ctx);
        self.store
            .write("allocate", |tx| allocator.allocate(tx, &request))
            .inspect_err(|err| {
                if err.is_business_rejection() {
                    warn!(sale_id = %request.sale_id, error = %err, "sale rejected");
                }
            })
    }

    pub fn on_sale_deleted(&self, sale_id: SaleId) -> EngineResult<ReversalResult> {
        self.store
            .write("reverse_sale", |tx| ReversalCoordinator.reverse_sale(tx, sale_id))
    }

    pub fn on_settlement(
        &self,
        customer_id: HolderId,
        amount: Decimal,
        account_id: AccountId,
    ) -> EngineResult<SettlementResult> {
        self.store.write("settlement", |tx| {
            settle(tx, &self.ctx, customer_id, amount, account_id)
        })
    }

    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        note: Option<&str>,
    ) -> EngineResult<LedgerEntry> {
        self.store.write("deposit", |tx| {
            cash::deposit(tx, &self.ctx, account_id, amount, note)
        })
    }

    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        note: Option<&str>,
    ) -> EngineResult<LedgerEntry> {
        self.store.write("withdraw", |tx| {
            cash::withdraw(tx, &self.ctx, account_id, amount, note)
        })
    }

    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        note: Option<&str>,
    ) -> EngineResult<Vec<LedgerEntry>> {
        self.store
            .write("transfer", |tx| cash::transfer(tx, from, to, amount, note))
    }

    pub fn withdraw_profit(
        &self,
        amount: Decimal,
        cash_account_id: AccountId,
        note: Option<&str>,
    ) -> EngineResult<Vec<LedgerEntry>> {
        self.store.write("withdraw_profit", |tx| {
            cash::withdraw_profit(tx, &self.ctx, amount, cash_account_id, note)
        })
    }

    pub fn adjust_inventory(
        &self,
        lot_id: LotId,
        delta: Decimal,
        account_id: AccountId,
        reason: &str,
    ) -> EngineResult<AdjustmentResult> {
        self.store.write("adjust_inventory", |tx| {
            adjust_inventory(tx, lot_id, delta, account_id, reason)
        })
    }

    pub fn inventory_summary(&self, currency: &Currency) -> EngineResult<InventorySummary> {
        self.store
            .read(|conn| LotStore::new(conn).inventory_summary(currency))
    }

    pub fn lots(&self, currency: &Currency) -> EngineResult<Vec<Lot>> {
        self.store.read(|conn| LotStore::new(conn).lots(currency))
    }

    pub fn sale(&self, sale_id: SaleId) -> EngineResult<Sale> {
        self.store
            .read(|conn| RecordStore::new(conn).require_sale(sale_id))
    }

    pub fn purchase(&self, purchase_id: PurchaseId) -> EngineResult<Purchase> {
        self.store
            .read(|conn| RecordStore::new(conn).require_purchase(purchase_id))
    }

    pub fn allocations_for_sale(&self, sale_id: SaleId) -> EngineResult<Vec<Allocation>> {
        self.store
            .read(|conn| LotStore::new(conn).allocations_for_sale(sale_id))
    }

    pub fn account(&self, account_id: AccountId) -> EngineResult<CashAccount> {
        Ok(self.ledger.account(account_id)?)
    }

    pub fn accounts(&self, currency: Option<&Currency>) -> EngineResult<Vec<CashAccount>> {
        Ok(self.ledger.accounts(currency)?)
    }

    pub fn account_balance(&self, account_id: AccountId) -> EngineResult<Decimal> {
        Ok(self.ledger.account(account_id)?.balance)
    }

    /// Page `page` (1-based) of the account's history with running balances.
    pub fn ledger_history(&self, account_id: AccountId, page: usize) -> EngineResult<LedgerPage> {
        Ok(self
            .ledger
            .history(account_id, page, self.ctx.config.history_page_size)?)
    }

    pub fn running_balance(
        &self,
        account_id: AccountId,
        as_of: DateTime<Utc>,
    ) -> EngineResult<Decimal> {
        self.ledger.account(account_id)?;
        Ok(self.ledger.running_balance(account_id, as_of)?)
    }

    pub fn check_consistency(&self, currency: &Currency) -> EngineResult<DiscrepancyReport> {
        let checker = self.checker();
        self.store.read(|conn| checker.check(conn, currency))
    }

    pub fn repair(&self, currency: &Currency, reason: &str) -> EngineResult<RepairReport> {
        let checker = self.checker();
        self.store
            .write("repair", |tx| checker.repair(tx, currency, reason))
    }

    fn checker(&self) -> ReconciliationChecker {
        ReconciliationChecker::new(
            self.ctx.config.epsilon,
            self.ctx.foreign_currency().clone(),
        )
    }
}
