mod common;

use std::time::Duration;

use common::{rmb, t, twd, Desk, OWNER};
use fxbook_core::NewAccount;
use fxbook_engine::EngineError;
use fxbook_ledger::{open_connection, LedgerType};
use rusqlite::params;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tamper(desk: &Desk, sql: &str, value: &str, id: i64) {
    let conn = open_connection(&desk.db_path(), Duration::from_secs(1)).unwrap();
    conn.execute(sql, params![value, id]).unwrap();
}

#[test]
fn fresh_book_is_consistent() {
    let desk = Desk::new();
    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert!(report.inventory_tracked);
    assert_eq!(report.account_total, Decimal::ZERO);
    report.ensure_consistent().unwrap();

    let home = desk.book.check_consistency(&twd()).unwrap();
    assert!(!home.inventory_tracked);
    assert!(home.is_consistent());
}

#[test]
fn opening_without_a_database_path_fails() {
    let mut config = fxbook_config::AppConfig::default();
    config.database.path = std::path::PathBuf::new();
    assert!(matches!(
        fxbook_engine::FxBook::open(&config),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn tampered_balance_is_detected_and_repaired() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.sell(1, dec!(250), dec!(1100)).unwrap();
    tamper(
        &desk,
        "UPDATE cash_accounts SET balance = ?1 WHERE id = ?2",
        "800",
        desk.rmb_cash.get(),
    );

    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.difference, dec!(50));
    assert_eq!(report.ledger_drift.len(), 1);
    assert_eq!(report.ledger_drift[0].stored_balance, dec!(800));
    assert_eq!(report.ledger_drift[0].ledger_balance, dec!(750));
    match report.ensure_consistent() {
        Err(EngineError::ReconciliationMismatch { difference, .. }) => {
            assert_eq!(difference, dec!(50))
        }
        other => panic!("expected mismatch, got {other:?}"),
    }

    let repair = desk.book.repair(&rmb(), "till recount").unwrap();
    assert_eq!(repair.corrections.len(), 1);
    assert_eq!(repair.corrections[0].before, dec!(800));
    assert_eq!(repair.corrections[0].after, dec!(750));
    assert!(repair.report.is_consistent());
    assert_eq!(desk.balance(desk.rmb_cash), dec!(750));

    let page = desk.book.ledger_history(desk.rmb_cash, 1).unwrap();
    let last = page.lines.last().unwrap();
    assert_eq!(last.entry.entry_type, LedgerType::Adjustment);
    assert_eq!(last.entry.amount, Decimal::ZERO);
    assert_eq!(last.entry.balance_before, dec!(800));
    assert_eq!(last.running_balance, dec!(750));
    let meta = last.entry.meta.as_ref().unwrap();
    assert_eq!(meta["reason"], "till recount");
    assert_eq!(meta["change"], "-50");

    // a second repair has nothing to do
    assert!(desk.book.repair(&rmb(), "again").unwrap().corrections.is_empty());
}

#[test]
fn repair_never_rewrites_lots() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(1000), dec!(4.0), t(1)).lot;
    tamper(
        &desk,
        "UPDATE lots SET remaining_amount = ?1 WHERE id = ?2",
        "990",
        lot.id.get(),
    );

    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert_eq!(report.conservation_violations.len(), 1);
    assert_eq!(report.conservation_violations[0].expected_remaining, dec!(1000));
    assert_eq!(report.difference, dec!(10));

    let repair = desk.book.repair(&rmb(), "audit").unwrap();
    assert!(repair.corrections.is_empty());
    assert!(!repair.report.is_consistent());
    assert_eq!(
        desk.book.lots(&rmb()).unwrap()[0].remaining_amount,
        dec!(990)
    );
}

#[test]
fn negative_lot_is_reported() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(10), dec!(4.0), t(1)).lot;
    tamper(
        &desk,
        "UPDATE lots SET remaining_amount = ?1 WHERE id = ?2",
        "-1",
        lot.id.get(),
    );
    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert_eq!(report.negative_lots, vec![lot.id]);
}

#[test]
fn lot_above_its_purchase_is_reported() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(100), dec!(4.0), t(1)).lot;
    tamper(
        &desk,
        "UPDATE lots SET remaining_amount = ?1 WHERE id = ?2",
        "140",
        lot.id.get(),
    );
    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert_eq!(report.over_original_lots, vec![lot.id]);
    assert!(report.negative_lots.is_empty());
    assert!(!report.is_consistent());
}

#[test]
fn inactive_accounts_drop_out_of_totals() {
    let desk = Desk::new();
    let spare = desk
        .book
        .open_account(NewAccount::cash(OWNER, "spare RMB", rmb()))
        .unwrap();
    desk.book.deactivate_account(spare.id).unwrap();
    let report = desk.book.check_consistency(&rmb()).unwrap();
    assert!(report.accounts.iter().all(|a| a.account_id != spare.id));
    assert!(report.is_consistent());
}

#[test]
fn cash_movements_keep_books_balanced() {
    let desk = Desk::new();
    let vault = desk
        .book
        .open_account(NewAccount::cash(OWNER, "RMB vault", rmb()))
        .unwrap()
        .id;
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.sell(1, dec!(400), dec!(1800)).unwrap();

    desk.book
        .transfer(desk.rmb_cash, vault, dec!(250), Some("night drop"))
        .unwrap();
    assert_eq!(desk.balance(vault), dec!(250));
    assert_eq!(desk.balance(desk.rmb_cash), dec!(350));

    // foreign cash only moves through purchases and sales
    assert!(matches!(
        desk.book.deposit(vault, dec!(10), None),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        desk.book.transfer(desk.rmb_cash, desk.twd_cash, dec!(1), None),
        Err(EngineError::Validation(_))
    ));

    let profit = desk.balance(desk.book.profit_account_id());
    assert_eq!(profit, dec!(200));
    let before = desk.balance(desk.twd_cash);
    desk.book
        .withdraw_profit(dec!(150), desk.twd_cash, Some("owner draw"))
        .unwrap();
    assert_eq!(desk.balance(desk.book.profit_account_id()), dec!(50));
    assert_eq!(desk.balance(desk.twd_cash), before - dec!(150));
    assert!(matches!(
        desk.book.withdraw_profit(dec!(51), desk.twd_cash, None),
        Err(EngineError::Validation(_))
    ));

    desk.book.withdraw(desk.twd_cash, dec!(1000), None).unwrap();
    desk.assert_reconciled();
}

#[test]
fn inventory_adjustment_moves_lot_and_cash_together() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(500), dec!(4.0), t(1)).lot;
    desk.sell(1, dec!(100), dec!(450)).unwrap();

    let adjusted = desk
        .book
        .adjust_inventory(lot.id, dec!(-20), desk.rmb_cash, "damaged notes")
        .unwrap();
    assert_eq!(adjusted.lot.remaining_amount, dec!(380));
    assert_eq!(adjusted.lot.adjusted_amount, dec!(-20));
    assert_eq!(adjusted.entry.entry_type, LedgerType::Adjustment);
    assert_eq!(desk.balance(desk.rmb_cash), dec!(380));
    desk.assert_reconciled();

    assert!(matches!(
        desk.book.adjust_inventory(lot.id, dec!(5), desk.rmb_cash, "  "),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        desk.book
            .adjust_inventory(lot.id, dec!(200), desk.rmb_cash, "found"),
        Err(EngineError::Validation(_))
    ));

    // reversing the sale still restores exactly what it took
    desk.book.on_sale_deleted(fxbook_core::SaleId(1)).unwrap();
    assert_eq!(desk.book.lots(&rmb()).unwrap()[0].remaining_amount, dec!(480));
    desk.assert_reconciled();
}

#[test]
fn deactivation_requires_zero_balance() {
    let desk = Desk::new();
    assert!(desk.book.deactivate_account(desk.twd_cash).is_err());
    assert!(desk
        .book
        .deactivate_account(desk.book.profit_account_id())
        .is_err());
}
