use fxbook_core::{AccountId, AccountKind, Lot, LotId};
use fxbook_ledger::{AccountLedger, EntryDraft, LedgerEntry, LedgerType};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::context::{require_account, require_funds};
use crate::lots::LotStore;
use crate::{EngineError, EngineResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub lot: Lot,
    pub entry: LedgerEntry,
}

/// Correct one lot's physical inventory by `delta` and mirror it on a
/// foreign cash account so the two stay reconciled.
pub fn adjust_inventory(
    tx: &Transaction<'_>,
    lot_id: LotId,
    delta: Decimal,
    account_id: AccountId,
    reason: &str,
) -> EngineResult<AdjustmentResult> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::Validation(
            "inventory adjustments require a reason".into(),
        ));
    }
    if delta.is_zero() {
        return Err(EngineError::Validation("adjustment delta must be non-zero".into()));
    }

    let lots = LotStore::new(tx);
    let lot = lots.lot(lot_id)?;
    let remaining = lot.remaining_amount + delta;
    let adjusted = lot.adjusted_amount + delta;
    if remaining < Decimal::ZERO || remaining > lot.original_amount {
        return Err(EngineError::Validation(format!(
            "lot {lot_id} remaining would become {remaining}, outside 0..={}",
            lot.original_amount
        )));
    }
    // Sold stock returns to the lot on reversal; only write-downs may be undone.
    if adjusted > Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "lot {lot_id} can be raised by at most {} after earlier write-downs",
            -lot.adjusted_amount
        )));
    }

    let ledger = AccountLedger::new(tx);
    let account = require_account(
        &ledger,
        account_id,
        &lot.currency,
        &[AccountKind::Cash],
        "adjustment",
    )?;
    if delta < Decimal::ZERO {
        require_funds(&account, -delta)?;
    }

    let lot = lots.write_amounts(&lot, remaining, adjusted)?;
    let entry = ledger.apply_entry(
        EntryDraft::new(
            account_id,
            LedgerType::Adjustment,
            delta,
            format!("lot:{lot_id}"),
        )
        .with_meta(json!({ "lot_id": lot_id, "reason": reason })),
    )?;
    info!(
        lot_id = %lot_id,
        delta = %delta,
        remaining = %lot.remaining_amount,
        reason,
        "inventory adjusted"
    );
    Ok(AdjustmentResult { lot, entry })
}
