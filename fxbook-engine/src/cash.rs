//! Cash movements that never touch inventory.

use fxbook_core::{AccountId, AccountKind};
use fxbook_ledger::{AccountLedger, EntryDraft, LedgerEntry, LedgerType};
use rusqlite::Transaction;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::context::{require_account, require_funds, require_positive};
use crate::{BookContext, EngineError, EngineResult};

fn movement_ref(kind: &str) -> String {
    format!("{kind}:{}", Uuid::new_v4())
}

fn note_meta(note: Option<&str>) -> Option<serde_json::Value> {
    note.map(|note| json!({ "note": note }))
}

/// External money coming into a home-currency cash account. Foreign cash
/// only enters through purchases.
pub fn deposit(
    tx: &Transaction<'_>,
    ctx: &BookContext,
    account_id: AccountId,
    amount: Decimal,
    note: Option<&str>,
) -> EngineResult<LedgerEntry> {
    require_positive(amount, "deposit amount")?;
    let ledger = AccountLedger::new(tx);
    require_account(
        &ledger,
        account_id,
        ctx.home_currency(),
        &[AccountKind::Cash],
        "deposit",
    )?;
    let mut draft = EntryDraft::new(account_id, LedgerType::Deposit, amount, movement_ref("deposit"));
    draft.meta = note_meta(note);
    let entry = ledger.apply_entry(draft)?;
    info!(account_id = %account_id, amount = %amount, "deposit recorded");
    Ok(entry)
}

pub fn withdraw(
    tx: &Transaction<'_>,
    ctx: &BookContext,
    account_id: AccountId,
    amount: Decimal,
    note: Option<&str>,
) -> EngineResult<LedgerEntry> {
    require_positive(amount, "withdrawal amount")?;
    let ledger = AccountLedger::new(tx);
    let account = require_account(
        &ledger,
        account_id,
        ctx.home_currency(),
        &[AccountKind::Cash],
        "withdrawal",
    )?;
    require_funds(&account, amount)?;
    let mut draft =
        EntryDraft::new(account_id, LedgerType::Withdraw, -amount, movement_ref("withdraw"));
    draft.meta = note_meta(note);
    let entry = ledger.apply_entry(draft)?;
    info!(account_id = %account_id, amount = %amount, "withdrawal recorded");
    Ok(entry)
}

/// Move cash between two accounts of the same currency.
pub fn transfer(
    tx: &Transaction<'_>,
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    note: Option<&str>,
) -> EngineResult<Vec<LedgerEntry>> {
    require_positive(amount, "transfer amount")?;
    if from == to {
        return Err(EngineError::Validation(
            "transfer source and destination must differ".into(),
        ));
    }
    let ledger = AccountLedger::new(tx);
    let source = ledger.account(from)?;
    require_account(&ledger, from, &source.currency, &[AccountKind::Cash], "source")?;
    require_account(
        &ledger,
        to,
        &source.currency,
        &[AccountKind::Cash],
        "destination",
    )?;
    require_funds(&source, amount)?;

    let related = movement_ref("transfer");
    let meta = json!({ "from": from, "to": to, "note": note });
    let entries = vec![
        ledger.apply_entry(
            EntryDraft::new(from, LedgerType::TransferOut, -amount, related.clone())
                .with_meta(meta.clone()),
        )?,
        ledger.apply_entry(
            EntryDraft::new(to, LedgerType::TransferIn, amount, related).with_meta(meta),
        )?,
    ];
    info!(
        from = %from,
        to = %to,
        amount = %amount,
        currency = %source.currency,
        "transfer recorded"
    );
    Ok(entries)
}

/// Take realized profit out of the business, paid from a home cash account.
pub fn withdraw_profit(
    tx: &Transaction<'_>,
    ctx: &BookContext,
    amount: Decimal,
    cash_account_id: AccountId,
    note: Option<&str>,
) -> EngineResult<Vec<LedgerEntry>> {
    require_positive(amount, "profit withdrawal")?;
    let ledger = AccountLedger::new(tx);
    let profit = require_account(
        &ledger,
        ctx.profit_account,
        ctx.home_currency(),
        &[AccountKind::Profit],
        "profit",
    )?;
    if amount > profit.balance {
        return Err(EngineError::Validation(format!(
            "profit withdrawal of {amount} exceeds available profit {}",
            profit.balance
        )));
    }
    let cash = require_account(
        &ledger,
        cash_account_id,
        ctx.home_currency(),
        &[AccountKind::Cash],
        "payout",
    )?;
    require_funds(&cash, amount)?;

    let related = movement_ref("profit-withdraw");
    let meta = json!({ "note": note });
    let entries = vec![
        ledger.apply_entry(
            EntryDraft::new(profit.id, LedgerType::ProfitWithdraw, -amount, related.clone())
                .with_meta(meta.clone()),
        )?,
        ledger.apply_entry(
            EntryDraft::new(cash.id, LedgerType::Withdraw, -amount, related).with_meta(meta),
        )?,
    ];
    info!(amount = %amount, cash_account = %cash.id, "profit withdrawn");
    Ok(entries)
}
