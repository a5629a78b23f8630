//! FIFO matching of sales against purchase lots.
//!
//! [`plan_fifo`] decides which lots a sale consumes and how proceeds split
//! across them without touching storage; [`FifoAllocator::allocate`] applies
//! a plan inside the caller's transaction.

use chrono::Utc;
use fxbook_core::money::round_money;
use fxbook_core::{
    AccountId, AccountKind, Allocation, Currency, Lot, LotId, Sale, SaleId, SaleStatus,
};
use fxbook_ledger::{AccountLedger, EntryDraft, LedgerEntry, LedgerType};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::context::{checked_product, require_account, require_funds, require_positive};
use crate::lots::LotStore;
use crate::records::{sale_ref, RecordStore};
use crate::{BookContext, EngineError, EngineResult};

/// Incoming sale of foreign currency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaleRequest {
    pub sale_id: SaleId,
    pub requested_foreign: Decimal,
    pub home_proceeds: Decimal,
    pub foreign_account_id: AccountId,
    /// Home cash account for a cash sale, or the customer's receivable
    /// account for a credit sale.
    pub home_account_id: AccountId,
}

/// One lot's share of a planned sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSlice {
    pub lot_id: LotId,
    pub amount: Decimal,
    pub cost: Decimal,
    pub proceeds: Decimal,
    pub profit: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllocationResult {
    pub sale: Sale,
    /// In FIFO order.
    pub allocations: Vec<Allocation>,
    pub entries: Vec<LedgerEntry>,
}

impl AllocationResult {
    pub fn realized_profit(&self) -> Decimal {
        self.sale.realized_profit
    }
}

/// Split `requested` units across `lots` oldest first.
///
/// Slice proceeds are prorated and rounded to `scale`; the final slice absorbs
/// the rounding remainder so slices always sum to `proceeds`.
pub fn plan_fifo(
    currency: &Currency,
    lots: &[Lot],
    requested: Decimal,
    proceeds: Decimal,
    scale: u32,
) -> EngineResult<Vec<PlannedSlice>> {
    let mut ordered: Vec<&Lot> = lots.iter().filter(|lot| lot.has_inventory()).collect();
    ordered.sort_by(|a, b| a.fifo_cmp(b));

    let available: Decimal = ordered.iter().map(|lot| lot.remaining_amount).sum();
    if available < requested {
        return Err(EngineError::InsufficientInventory {
            currency: currency.clone(),
            requested,
            available,
        });
    }

    let mut still_needed = requested;
    let mut proceeds_left = proceeds;
    let mut slices = Vec::new();
    for lot in ordered {
        if still_needed.is_zero() {
            break;
        }
        let amount = lot.remaining_amount.min(still_needed);
        still_needed -= amount;
        let cost = round_money(checked_product(amount, lot.unit_cost, "slice cost")?, scale);
        let slice_proceeds = if still_needed.is_zero() {
            proceeds_left
        } else {
            round_money(
                checked_product(proceeds, amount, "slice proceeds")? / requested,
                scale,
            )
        };
        proceeds_left -= slice_proceeds;
        slices.push(PlannedSlice {
            lot_id: lot.id,
            amount,
            cost,
            proceeds: slice_proceeds,
            profit: slice_proceeds - cost,
        });
    }
    Ok(slices)
}

/// Applies FIFO plans: lots, allocations, sale record and ledger entries
/// change together or not at all.
pub struct FifoAllocator<'a> {
    ctx: &'a BookContext,
}

impl<'a> FifoAllocator<'a> {
    pub fn new(ctx: &'a BookContext) -> Self {
        Self { ctx }
    }

    pub fn allocate(
        &self,
        tx: &Transaction<'_>,
        request: &SaleRequest,
    ) -> EngineResult<AllocationResult> {
        require_positive(request.requested_foreign, "sale amount")?;
        require_positive(request.home_proceeds, "sale proceeds")?;
        let records = RecordStore::new(tx);
        if records.sale(request.sale_id)?.is_some() {
            return Err(EngineError::Validation(format!(
                "sale {} already exists",
                request.sale_id
            )));
        }

        let ledger = AccountLedger::new(tx);
        let currency = self.ctx.foreign_currency();
        let foreign = require_account(
            &ledger,
            request.foreign_account_id,
            currency,
            &[AccountKind::Cash],
            "foreign",
        )?;
        let home = require_account(
            &ledger,
            request.home_account_id,
            self.ctx.home_currency(),
            &[AccountKind::Cash, AccountKind::Receivable],
            "home",
        )?;

        let lots = LotStore::new(tx);
        let available = lots.available_lots(currency)?;
        let plan = plan_fifo(
            currency,
            &available,
            request.requested_foreign,
            request.home_proceeds,
            self.ctx.config.money_scale,
        )?;
        require_funds(&foreign, request.requested_foreign)?;

        let realized_profit: Decimal = plan.iter().map(|slice| slice.profit).sum();
        let mut sale = Sale {
            id: request.sale_id,
            foreign_account_id: foreign.id,
            home_account_id: home.id,
            customer_id: (home.kind == AccountKind::Receivable).then_some(home.holder_id),
            foreign_amount: request.requested_foreign,
            home_proceeds: request.home_proceeds,
            realized_profit: Decimal::ZERO,
            settled_amount: Decimal::ZERO,
            status: SaleStatus::Allocated,
            created_at: Utc::now(),
        };
        records.insert_sale(&sale)?;

        // Lot rows are written in ascending id order so concurrent writers
        // always lock them in the same sequence.
        let mut by_id: Vec<&PlannedSlice> = plan.iter().collect();
        by_id.sort_by_key(|slice| slice.lot_id);
        for slice in by_id {
            let lot = available
                .iter()
                .find(|lot| lot.id == slice.lot_id)
                .ok_or_else(|| EngineError::NotFound(format!("lot {}", slice.lot_id)))?;
            lots.write_amounts(
                lot,
                lot.remaining_amount - slice.amount,
                lot.adjusted_amount,
            )?;
        }

        let mut allocations = Vec::with_capacity(plan.len());
        for slice in &plan {
            let allocation = lots.insert_allocation(
                slice.lot_id,
                sale.id,
                slice.amount,
                slice.cost,
                slice.profit,
            )?;
            debug!(
                sale_id = %sale.id,
                lot_id = %slice.lot_id,
                amount = %slice.amount,
                cost = %slice.cost,
                proceeds = %slice.proceeds,
                profit = %slice.profit,
                "lot slice allocated"
            );
            allocations.push(allocation);
        }

        sale.realized_profit = realized_profit;
        records.update_sale(&sale)?;

        let related = sale_ref(sale.id);
        let meta = json!({
            "allocations": allocations.iter().map(|a| a.id).collect::<Vec<_>>(),
        });
        let mut entries = vec![
            ledger.apply_entry(
                EntryDraft::new(
                    foreign.id,
                    LedgerType::Sale,
                    -request.requested_foreign,
                    related.clone(),
                )
                .with_meta(meta.clone()),
            )?,
            ledger.apply_entry(
                EntryDraft::new(
                    home.id,
                    LedgerType::Sale,
                    request.home_proceeds,
                    related.clone(),
                )
                .with_meta(meta),
            )?,
        ];
        if !realized_profit.is_zero() {
            entries.push(ledger.apply_entry(EntryDraft::new(
                self.ctx.profit_account,
                LedgerType::ProfitEarned,
                realized_profit,
                related,
            ))?);
        }

        info!(
            sale_id = %sale.id,
            amount = %sale.foreign_amount,
            proceeds = %sale.home_proceeds,
            profit = %realized_profit,
            lots = allocations.len(),
            "sale allocated"
        );
        Ok(AllocationResult {
            sale,
            allocations,
            entries,
        })
    }
}
