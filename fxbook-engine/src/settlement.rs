use fxbook_core::{AccountId, AccountKind, HolderId, SaleId, SaleStatus};
use fxbook_ledger::{AccountLedger, EntryDraft, LedgerEntry, LedgerType};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::context::{require_account, require_positive};
use crate::records::RecordStore;
use crate::{BookContext, EngineError, EngineResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementResult {
    pub customer_id: HolderId,
    pub amount: Decimal,
    /// Receivable still outstanding after this payment.
    pub outstanding: Decimal,
    /// Amount applied to each sale, oldest first.
    pub applied: Vec<(SaleId, Decimal)>,
    pub settled_sales: Vec<SaleId>,
    pub entries: Vec<LedgerEntry>,
}

/// Record a customer payment: the receivable shrinks and the cash account
/// grows by the same amount. Inventory is not touched.
pub fn settle(
    tx: &Transaction<'_>,
    ctx: &BookContext,
    customer_id: HolderId,
    amount: Decimal,
    cash_account_id: AccountId,
) -> EngineResult<SettlementResult> {
    require_positive(amount, "settlement amount")?;
    let ledger = AccountLedger::new(tx);
    let cash = require_account(
        &ledger,
        cash_account_id,
        ctx.home_currency(),
        &[AccountKind::Cash],
        "settlement",
    )?;
    let receivable = ledger
        .find_account(customer_id, ctx.home_currency(), AccountKind::Receivable)?
        .ok_or_else(|| EngineError::NotFound(format!("receivable of customer {customer_id}")))?;
    if amount > receivable.balance {
        return Err(EngineError::Validation(format!(
            "settlement of {amount} exceeds outstanding receivable {} for customer {customer_id}",
            receivable.balance
        )));
    }

    let records = RecordStore::new(tx);
    let mut left = amount;
    let mut applied = Vec::new();
    let mut settled_sales = Vec::new();
    for mut sale in records.open_sales_for_customer(customer_id, receivable.id)? {
        if left.is_zero() {
            break;
        }
        let portion = sale.outstanding().min(left);
        if portion <= Decimal::ZERO {
            continue;
        }
        left -= portion;
        sale.settled_amount += portion;
        if sale.outstanding().is_zero() {
            sale.status = SaleStatus::Settled;
            settled_sales.push(sale.id);
        }
        records.update_sale(&sale)?;
        applied.push((sale.id, portion));
    }

    let related = format!("settlement:{}", Uuid::new_v4());
    let meta = json!({
        "customer_id": customer_id,
        "applied": applied
            .iter()
            .map(|(sale_id, portion)| json!({ "sale_id": sale_id, "amount": portion.to_string() }))
            .collect::<Vec<_>>(),
    });
    let entries = vec![
        ledger.apply_entry(
            EntryDraft::new(receivable.id, LedgerType::Settlement, -amount, related.clone())
                .with_meta(meta.clone()),
        )?,
        ledger.apply_entry(
            EntryDraft::new(cash.id, LedgerType::Settlement, amount, related).with_meta(meta),
        )?,
    ];

    let outstanding = receivable.balance - amount;
    info!(
        customer_id = %customer_id,
        amount = %amount,
        outstanding = %outstanding,
        settled = settled_sales.len(),
        "settlement recorded"
    );
    Ok(SettlementResult {
        customer_id,
        amount,
        outstanding,
        applied,
        settled_sales,
        entries,
    })
}
