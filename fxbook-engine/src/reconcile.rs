//! Independent verification that account balances, the ledger and lot
//! inventory agree.

use chrono::{DateTime, Utc};
use fxbook_core::money::within;
use fxbook_core::{AccountId, AccountKind, Currency, LotId};
use fxbook_ledger::{
    history::replay_balance, load_accounts, query_entries, AccountLedger, LedgerQuery,
};
use rusqlite::{Connection, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::lots::LotStore;
use crate::{EngineError, EngineResult};

/// Cash account counted towards the currency total.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountContribution {
    pub account_id: AccountId,
    pub name: String,
    pub balance: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LotContribution {
    pub lot_id: LotId,
    pub remaining: Decimal,
}

/// Stored balance that the ledger does not explain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerDrift {
    pub account_id: AccountId,
    pub stored_balance: Decimal,
    pub ledger_balance: Decimal,
    pub difference: Decimal,
}

/// Lot whose remaining amount disagrees with its active allocations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConservationViolation {
    pub lot_id: LotId,
    pub expected_remaining: Decimal,
    pub actual_remaining: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub currency: Currency,
    pub checked_at: DateTime<Utc>,
    /// `false` for currencies without lot inventory; only ledger drift is
    /// checked for those.
    pub inventory_tracked: bool,
    pub account_total: Decimal,
    pub inventory_total: Decimal,
    /// `account_total - inventory_total`.
    pub difference: Decimal,
    pub epsilon: Decimal,
    pub accounts: Vec<AccountContribution>,
    pub lots: Vec<LotContribution>,
    pub ledger_drift: Vec<LedgerDrift>,
    pub negative_lots: Vec<LotId>,
    /// Lots holding more than was purchased.
    pub over_original_lots: Vec<LotId>,
    pub conservation_violations: Vec<ConservationViolation>,
}

impl DiscrepancyReport {
    pub fn totals_match(&self) -> bool {
        !self.inventory_tracked
            || within(self.account_total, self.inventory_total, self.epsilon)
    }

    pub fn is_consistent(&self) -> bool {
        self.totals_match()
            && self.ledger_drift.is_empty()
            && self.negative_lots.is_empty()
            && self.over_original_lots.is_empty()
            && self.conservation_violations.is_empty()
    }

    /// Turn an inconsistent report into [`EngineError::ReconciliationMismatch`].
    pub fn ensure_consistent(&self) -> EngineResult<()> {
        if self.is_consistent() {
            return Ok(());
        }
        Err(EngineError::ReconciliationMismatch {
            currency: self.currency.clone(),
            difference: self.difference,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountCorrection {
    pub account_id: AccountId,
    pub before: Decimal,
    pub after: Decimal,
    pub entry_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepairReport {
    pub currency: Currency,
    pub corrections: Vec<AccountCorrection>,
    /// State after the corrections were applied.
    pub report: DiscrepancyReport,
}

pub struct ReconciliationChecker {
    epsilon: Decimal,
    inventory_currency: Currency,
}

impl ReconciliationChecker {
    pub fn new(epsilon: Decimal, inventory_currency: Currency) -> Self {
        Self {
            epsilon,
            inventory_currency,
        }
    }

    /// Read-only comparison of balances, ledger and lots for `currency`.
    pub fn check(&self, conn: &Connection, currency: &Currency) -> EngineResult<DiscrepancyReport> {
        let accounts = load_accounts(conn, Some(currency))?;

        let mut ledger_drift = Vec::new();
        for account in &accounts {
            let entries = query_entries(conn, &LedgerQuery::for_account(account.id))?;
            let ledger_balance = replay_balance(&entries);
            if ledger_balance != account.balance {
                ledger_drift.push(LedgerDrift {
                    account_id: account.id,
                    stored_balance: account.balance,
                    ledger_balance,
                    difference: account.balance - ledger_balance,
                });
            }
        }

        let contributions: Vec<AccountContribution> = accounts
            .iter()
            .filter(|account| account.is_active && account.kind == AccountKind::Cash)
            .map(|account| AccountContribution {
                account_id: account.id,
                name: account.name.clone(),
                balance: account.balance,
            })
            .collect();
        let account_total: Decimal = contributions.iter().map(|a| a.balance).sum();

        let inventory_tracked = currency == &self.inventory_currency;
        let findings = if inventory_tracked {
            self.inspect_lots(conn, currency)?
        } else {
            LotFindings::default()
        };
        let inventory_total: Decimal = findings.lots.iter().map(|lot| lot.remaining).sum();
        let difference = if inventory_tracked {
            account_total - inventory_total
        } else {
            Decimal::ZERO
        };

        let report = DiscrepancyReport {
            currency: currency.clone(),
            checked_at: Utc::now(),
            inventory_tracked,
            account_total,
            inventory_total,
            difference,
            epsilon: self.epsilon,
            accounts: contributions,
            lots: findings.lots,
            ledger_drift,
            negative_lots: findings.negative,
            over_original_lots: findings.over_original,
            conservation_violations: findings.violations,
        };
        log_findings(&report);
        Ok(report)
    }

    /// Reset drifted balances to what the ledger explains. Lots are never
    /// rewritten.
    pub fn repair(
        &self,
        tx: &Transaction<'_>,
        currency: &Currency,
        reason: &str,
    ) -> EngineResult<RepairReport> {
        let before = self.check(tx, currency)?;
        let ledger = AccountLedger::new(tx);
        let mut corrections = Vec::with_capacity(before.ledger_drift.len());
        for drift in &before.ledger_drift {
            let entry = ledger.record_correction(
                drift.account_id,
                drift.ledger_balance,
                format!("repair:{currency}"),
                json!({
                    "before": drift.stored_balance.to_string(),
                    "after": drift.ledger_balance.to_string(),
                    "change": (drift.ledger_balance - drift.stored_balance).to_string(),
                    "reason": reason,
                }),
            )?;
            warn!(
                account_id = %drift.account_id,
                before = %drift.stored_balance,
                after = %drift.ledger_balance,
                reason,
                "account balance reset to ledger value"
            );
            corrections.push(AccountCorrection {
                account_id: drift.account_id,
                before: drift.stored_balance,
                after: drift.ledger_balance,
                entry_id: entry.id,
            });
        }
        let report = self.check(tx, currency)?;
        info!(
            currency = %currency,
            corrections = corrections.len(),
            consistent = report.is_consistent(),
            "repair finished"
        );
        Ok(RepairReport {
            currency: currency.clone(),
            corrections,
            report,
        })
    }

    fn inspect_lots(&self, conn: &Connection, currency: &Currency) -> EngineResult<LotFindings> {
        let store = LotStore::new(conn);
        let lots = store.lots(currency)?;
        let mut contributions = Vec::with_capacity(lots.len());
        let mut negative = Vec::new();
        let mut over_original = Vec::new();
        let mut violations = Vec::new();
        for lot in &lots {
            contributions.push(LotContribution {
                lot_id: lot.id,
                remaining: lot.remaining_amount,
            });
            if lot.remaining_amount < Decimal::ZERO {
                negative.push(lot.id);
            }
            if lot.remaining_amount > lot.original_amount {
                over_original.push(lot.id);
            }
            let allocated: Decimal = store
                .allocations_for_lot(lot.id)?
                .iter()
                .filter(|allocation| allocation.is_active())
                .map(|allocation| allocation.allocated_amount)
                .sum();
            let expected = lot.original_amount + lot.adjusted_amount - allocated;
            if expected != lot.remaining_amount {
                violations.push(ConservationViolation {
                    lot_id: lot.id,
                    expected_remaining: expected,
                    actual_remaining: lot.remaining_amount,
                });
            }
        }
        Ok(LotFindings {
            lots: contributions,
            negative,
            over_original,
            violations,
        })
    }
}

#[derive(Default)]
struct LotFindings {
    lots: Vec<LotContribution>,
    negative: Vec<LotId>,
    over_original: Vec<LotId>,
    violations: Vec<ConservationViolation>,
}

fn log_findings(report: &DiscrepancyReport) {
    if !report.totals_match() {
        warn!(
            currency = %report.currency,
            accounts = %report.account_total,
            inventory = %report.inventory_total,
            diff = %report.difference,
            "account balances and inventory disagree"
        );
    }
    for drift in &report.ledger_drift {
        warn!(
            account_id = %drift.account_id,
            stored = %drift.stored_balance,
            ledger = %drift.ledger_balance,
            "stored balance differs from ledger replay"
        );
    }
    for lot_id in &report.negative_lots {
        warn!(lot_id = %lot_id, "lot has negative remaining inventory");
    }
    for lot_id in &report.over_original_lots {
        warn!(lot_id = %lot_id, "lot holds more than its purchased amount");
    }
    for violation in &report.conservation_violations {
        warn!(
            lot_id = %violation.lot_id,
            expected = %violation.expected_remaining,
            actual = %violation.actual_remaining,
            "lot conservation violated"
        );
    }
    if report.is_consistent() {
        info!(currency = %report.currency, "reconciliation found no discrepancies");
    }
}
