use fxbook_config::EngineConfig;
use fxbook_core::money::round_money;
use fxbook_core::{AccountId, AccountKind, CashAccount, Currency};
use fxbook_ledger::{AccountLedger, LedgerError};
use rust_decimal::Decimal;

use crate::{EngineError, EngineResult};

/// Settings and well-known accounts every write operation needs.
#[derive(Clone, Debug)]
pub struct BookContext {
    pub config: EngineConfig,
    /// Home-currency account realized profit is booked to.
    pub profit_account: AccountId,
}

impl BookContext {
    pub fn new(config: EngineConfig, profit_account: AccountId) -> Self {
        Self {
            config,
            profit_account,
        }
    }

    pub fn home_currency(&self) -> &Currency {
        &self.config.home_currency
    }

    pub fn foreign_currency(&self) -> &Currency {
        &self.config.foreign_currency
    }

    pub fn round(&self, value: Decimal) -> Decimal {
        round_money(value, self.config.money_scale)
    }
}

/// Load an account and check it can take part in an operation as `role`.
pub(crate) fn require_account(
    ledger: &AccountLedger<'_>,
    account_id: AccountId,
    currency: &Currency,
    kinds: &[AccountKind],
    role: &str,
) -> EngineResult<CashAccount> {
    let account = ledger.account(account_id)?;
    if !account.is_active {
        return Err(LedgerError::InactiveAccount(account_id).into());
    }
    if &account.currency != currency {
        return Err(EngineError::Validation(format!(
            "{role} account {account_id} holds {}, expected {currency}",
            account.currency
        )));
    }
    if !kinds.contains(&account.kind) {
        return Err(EngineError::Validation(format!(
            "{role} account {account_id} is a {} account",
            account.kind
        )));
    }
    Ok(account)
}

pub(crate) fn require_positive(value: Decimal, what: &str) -> EngineResult<()> {
    if value <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "{what} must be positive, got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn require_funds(account: &CashAccount, amount: Decimal) -> EngineResult<()> {
    if account.balance < amount {
        return Err(EngineError::Validation(format!(
            "insufficient funds in account {}: need {amount} {}, balance {}",
            account.id, account.currency, account.balance
        )));
    }
    Ok(())
}

/// `a * b`, rejecting products outside the `Decimal` range instead of
/// panicking.
pub(crate) fn checked_product(a: Decimal, b: Decimal, what: &str) -> EngineResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| EngineError::Validation(format!("{what} overflows: {a} x {b}")))
}
