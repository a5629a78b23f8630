use chrono::{DateTime, Utc};
use fxbook_core::{AccountId, AccountKind, Lot, Purchase, PurchaseId, PurchaseStatus};
use fxbook_ledger::{AccountLedger, EntryDraft, LedgerEntry, LedgerType};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::{checked_product, require_account, require_funds, require_positive};
use crate::lots::LotStore;
use crate::records::{purchase_ref, RecordStore};
use crate::{BookContext, EngineError, EngineResult};

/// Incoming purchase of foreign currency paid from a home cash account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub purchase_id: PurchaseId,
    pub foreign_amount: Decimal,
    pub unit_cost: Decimal,
    pub payment_account_id: AccountId,
    pub deposit_account_id: AccountId,
    /// Defaults to the booking time.
    pub acquired_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub purchase: Purchase,
    pub lot: Lot,
    pub entries: Vec<LedgerEntry>,
}

/// Create the lot, pay for it and credit the foreign account.
pub fn book_purchase(
    tx: &Transaction<'_>,
    ctx: &BookContext,
    request: &PurchaseRequest,
) -> EngineResult<PurchaseResult> {
    require_positive(request.foreign_amount, "purchase amount")?;
    require_positive(request.unit_cost, "unit cost")?;
    let records = RecordStore::new(tx);
    if records.purchase(request.purchase_id)?.is_some() {
        return Err(EngineError::Validation(format!(
            "purchase {} already exists",
            request.purchase_id
        )));
    }

    let ledger = AccountLedger::new(tx);
    let payment = require_account(
        &ledger,
        request.payment_account_id,
        ctx.home_currency(),
        &[AccountKind::Cash],
        "payment",
    )?;
    require_account(
        &ledger,
        request.deposit_account_id,
        ctx.foreign_currency(),
        &[AccountKind::Cash],
        "deposit",
    )?;
    let home_cost = ctx.round(checked_product(
        request.foreign_amount,
        request.unit_cost,
        "purchase cost",
    )?);
    require_funds(&payment, home_cost)?;

    let acquired_at = request.acquired_at.unwrap_or_else(Utc::now);
    let lot = LotStore::new(tx).insert_lot(
        request.purchase_id,
        ctx.foreign_currency(),
        request.foreign_amount,
        request.unit_cost,
        acquired_at,
    )?;
    let purchase = Purchase {
        id: request.purchase_id,
        lot_id: Some(lot.id),
        payment_account_id: request.payment_account_id,
        deposit_account_id: request.deposit_account_id,
        foreign_amount: request.foreign_amount,
        unit_cost: request.unit_cost,
        home_cost,
        status: PurchaseStatus::Created,
        created_at: Utc::now(),
    };
    records.insert_purchase(&purchase)?;

    let related = purchase_ref(purchase.id);
    let meta = json!({
        "lot_id": lot.id,
        "foreign_amount": request.foreign_amount.to_string(),
        "unit_cost": request.unit_cost.to_string(),
    });
    let entries = vec![
        ledger.apply_entry(
            EntryDraft::new(
                request.deposit_account_id,
                LedgerType::Purchase,
                request.foreign_amount,
                related.clone(),
            )
            .with_meta(meta.clone()),
        )?,
        ledger.apply_entry(
            EntryDraft::new(
                request.payment_account_id,
                LedgerType::Purchase,
                -home_cost,
                related,
            )
            .with_meta(meta),
        )?,
    ];

    info!(
        purchase_id = %purchase.id,
        lot_id = %lot.id,
        amount = %request.foreign_amount,
        unit_cost = %request.unit_cost,
        home_cost = %home_cost,
        "purchase booked"
    );
    Ok(PurchaseResult {
        purchase,
        lot,
        entries,
    })
}
