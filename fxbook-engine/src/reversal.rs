use std::collections::{BTreeMap, HashSet};

use fxbook_core::{AccountId, AccountKind, LotId, PurchaseId, PurchaseStatus, SaleId, SaleStatus};
use fxbook_ledger::{AccountLedger, LedgerEntry};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::lots::LotStore;
use crate::records::{purchase_ref, sale_ref, RecordStore};
use crate::{EngineError, EngineResult};

/// Outcome of undoing a sale or purchase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReversalResult {
    pub entity: String,
    /// Lots whose remaining amount changed, with the amount returned (sales)
    /// or removed (purchases).
    pub restored_lots: Vec<(LotId, Decimal)>,
    pub compensating_entries: Vec<LedgerEntry>,
}

/// Undoes recorded mutations by appending their exact inverse.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReversalCoordinator;

impl ReversalCoordinator {
    pub fn reverse_sale(
        &self,
        tx: &Transaction<'_>,
        sale_id: SaleId,
    ) -> EngineResult<ReversalResult> {
        let entity = format!("sale {sale_id}");
        let records = RecordStore::new(tx);
        let mut sale = records.require_sale(sale_id)?;
        if sale.status.is_terminal() {
            return Err(EngineError::invalid_reversal(
                entity,
                format!("sale is already {}", sale.status),
            ));
        }
        if sale.settled_amount > Decimal::ZERO {
            return Err(EngineError::invalid_reversal(
                entity,
                format!("{} already settled", sale.settled_amount),
            ));
        }
        let pending = pending_compensations(tx, &entity, &sale_ref(sale_id))?;

        let lots = LotStore::new(tx);
        let mut active: Vec<_> = lots
            .allocations_for_sale(sale_id)?
            .into_iter()
            .filter(|allocation| allocation.is_active())
            .collect();
        active.sort_by_key(|allocation| allocation.lot_id);

        let mut restored_lots = Vec::with_capacity(active.len());
        for allocation in &active {
            let lot = lots.lot(allocation.lot_id)?;
            let remaining = lot.remaining_amount + allocation.allocated_amount;
            if remaining > lot.original_amount {
                return Err(EngineError::invalid_reversal(
                    entity,
                    format!("lot {} would exceed its purchased amount", lot.id),
                ));
            }
            lots.write_amounts(&lot, remaining, lot.adjusted_amount)?;
            lots.mark_reversed(allocation)?;
            restored_lots.push((lot.id, allocation.allocated_amount));
        }

        let compensating_entries = compensate_all(tx, &pending, &sale_ref(sale_id))?;
        sale.status = SaleStatus::Reversed;
        records.update_sale(&sale)?;

        info!(
            sale_id = %sale_id,
            allocations = active.len(),
            entries = compensating_entries.len(),
            "sale reversed"
        );
        Ok(ReversalResult {
            entity,
            restored_lots,
            compensating_entries,
        })
    }

    pub fn reverse_purchase(
        &self,
        tx: &Transaction<'_>,
        purchase_id: PurchaseId,
    ) -> EngineResult<ReversalResult> {
        let entity = format!("purchase {purchase_id}");
        let records = RecordStore::new(tx);
        let purchase = records.require_purchase(purchase_id)?;
        if purchase.status == PurchaseStatus::Reversed {
            return Err(EngineError::invalid_reversal(entity, "already reversed"));
        }

        let lots = LotStore::new(tx);
        let lot = lots.lot_for_purchase(purchase_id)?.ok_or_else(|| {
            EngineError::invalid_reversal(entity.clone(), "its lot no longer exists")
        })?;
        if !lot.is_untouched() {
            return Err(EngineError::invalid_reversal(
                entity,
                format!(
                    "lot {} has {} consumed and {} adjusted; reverse dependent sales first",
                    lot.id,
                    lot.consumed_amount(),
                    lot.adjusted_amount
                ),
            ));
        }

        let related_id = purchase_ref(purchase_id);
        let pending = pending_compensations(tx, &entity, &related_id)?;
        let compensating_entries = compensate_all(tx, &pending, &related_id)?;
        lots.delete_lot(&lot)?;
        records.mark_purchase_reversed(purchase_id)?;

        info!(
            purchase_id = %purchase_id,
            lot_id = %lot.id,
            amount = %lot.original_amount,
            "purchase reversed"
        );
        Ok(ReversalResult {
            entity,
            restored_lots: vec![(lot.id, -lot.original_amount)],
            compensating_entries,
        })
    }
}

/// Entries filed under `related_id` that still need their inverse, after
/// checking every touched account can take it.
fn pending_compensations(
    tx: &Transaction<'_>,
    entity: &str,
    related_id: &str,
) -> EngineResult<Vec<LedgerEntry>> {
    let ledger = AccountLedger::new(tx);
    let entries = ledger.entries_for(related_id)?;
    let already: HashSet<Uuid> = entries.iter().filter_map(|entry| entry.reverses).collect();
    let pending: Vec<LedgerEntry> = entries
        .into_iter()
        .filter(|entry| !entry.is_compensating() && !already.contains(&entry.id))
        .collect();

    let mut net: BTreeMap<AccountId, Decimal> = BTreeMap::new();
    for entry in &pending {
        *net.entry(entry.account_id).or_default() -= entry.amount;
    }
    for (account_id, change) in net {
        let account = ledger.account(account_id)?;
        if !account.is_active {
            return Err(EngineError::invalid_reversal(
                entity,
                format!("account {account_id} is inactive"),
            ));
        }
        // profit is a running tally that losses may already have driven negative
        if account.kind != AccountKind::Profit && account.balance + change < Decimal::ZERO {
            return Err(EngineError::invalid_reversal(
                entity,
                format!(
                    "account {account_id} holds {} {}, reversal needs {}",
                    account.balance, account.currency, -change
                ),
            ));
        }
    }
    Ok(pending)
}

/// Append the inverse of each pending entry.
fn compensate_all(
    tx: &Transaction<'_>,
    pending: &[LedgerEntry],
    related_id: &str,
) -> EngineResult<Vec<LedgerEntry>> {
    let ledger = AccountLedger::new(tx);
    let mut compensating = Vec::with_capacity(pending.len());
    for entry in pending {
        compensating.push(ledger.compensate(entry, related_id)?);
    }
    Ok(compensating)
}
