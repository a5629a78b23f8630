mod common;

use common::{rmb, t, Desk, OWNER, STARTING_TWD};
use fxbook_core::{NewAccount, PurchaseId, PurchaseStatus, SaleId};
use fxbook_engine::EngineError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn assert_invalid_reversal<T: std::fmt::Debug>(result: Result<T, EngineError>) {
    match result {
        Err(EngineError::InvalidReversal { .. }) => {}
        other => panic!("expected InvalidReversal, got {other:?}"),
    }
}

#[test]
fn sale_reversal_is_idempotent() {
    let desk = Desk::new();
    desk.buy(1, dec!(500), dec!(4.1), t(1));
    desk.sell(7, dec!(300), dec!(1290)).unwrap();
    desk.book.on_sale_deleted(SaleId(7)).unwrap();

    let entries = desk.book.ledger_history(desk.rmb_cash, 1).unwrap().total_entries;
    assert_invalid_reversal(desk.book.on_sale_deleted(SaleId(7)));
    assert_eq!(
        desk.book.ledger_history(desk.rmb_cash, 1).unwrap().total_entries,
        entries
    );
    assert_eq!(desk.balance(desk.rmb_cash), dec!(500));
    desk.assert_reconciled();
}

#[test]
fn unknown_entities_are_not_found() {
    let desk = Desk::new();
    assert!(matches!(
        desk.book.on_sale_deleted(SaleId(99)),
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        desk.book.on_purchase_deleted(PurchaseId(99)),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn purchase_with_dependent_sale_cannot_be_reversed() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.sell(5, dec!(100), dec!(420)).unwrap();

    assert_invalid_reversal(desk.book.on_purchase_deleted(PurchaseId(1)));
    assert_eq!(
        desk.book.inventory_summary(&rmb()).unwrap().total_remaining,
        dec!(900)
    );

    // once the sale is gone the lot is untouched again
    desk.book.on_sale_deleted(SaleId(5)).unwrap();
    let reversal = desk.book.on_purchase_deleted(PurchaseId(1)).unwrap();
    assert_eq!(reversal.compensating_entries.len(), 2);

    let summary = desk.book.inventory_summary(&rmb()).unwrap();
    assert_eq!(summary.lot_count, 0);
    assert_eq!(desk.balance(desk.rmb_cash), Decimal::ZERO);
    assert_eq!(desk.balance(desk.twd_cash), STARTING_TWD);

    let purchase = desk.book.purchase(PurchaseId(1)).unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Reversed);
    assert_eq!(purchase.lot_id, None);

    assert_invalid_reversal(desk.book.on_purchase_deleted(PurchaseId(1)));
    desk.assert_reconciled();
}

#[test]
fn adjusted_lot_blocks_purchase_reversal() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(200), dec!(4.0), t(1)).lot;
    desk.book
        .adjust_inventory(lot.id, dec!(-5), desk.rmb_cash, "counted short")
        .unwrap();
    assert_invalid_reversal(desk.book.on_purchase_deleted(PurchaseId(1)));
    desk.assert_reconciled();
}

#[test]
fn reversal_leaves_other_sales_alone() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.buy(2, dec!(1000), dec!(4.4), t(2));
    desk.sell(1, dec!(600), dec!(2700)).unwrap();
    let second = desk.sell(2, dec!(800), dec!(3600)).unwrap();
    assert_eq!(second.allocations.len(), 2);

    desk.book.on_sale_deleted(SaleId(1)).unwrap();
    let lots = desk.book.lots(&rmb()).unwrap();
    // sale 2 still holds 400 of lot A and 400 of lot B
    assert_eq!(lots[0].remaining_amount, dec!(600));
    assert_eq!(lots[1].remaining_amount, dec!(600));
    assert_eq!(desk.balance(desk.rmb_cash), dec!(1200));
    assert_eq!(
        desk.balance(desk.book.profit_account_id()),
        second.realized_profit()
    );
    desk.assert_reconciled();
}

#[test]
fn write_ups_cannot_push_a_lot_past_its_purchase() {
    let desk = Desk::new();
    let lot = desk.buy(1, dec!(1000), dec!(4.0), t(1)).lot;
    desk.sell(1, dec!(400), dec!(1800)).unwrap();

    // the 400 out on sale 1 comes back when it is reversed
    assert!(matches!(
        desk.book
            .adjust_inventory(lot.id, dec!(400), desk.rmb_cash, "recount"),
        Err(EngineError::Validation(_))
    ));

    desk.book
        .adjust_inventory(lot.id, dec!(-50), desk.rmb_cash, "torn notes")
        .unwrap();
    assert!(matches!(
        desk.book
            .adjust_inventory(lot.id, dec!(60), desk.rmb_cash, "found more"),
        Err(EngineError::Validation(_))
    ));
    desk.book
        .adjust_inventory(lot.id, dec!(50), desk.rmb_cash, "notes recovered")
        .unwrap();

    desk.book.on_sale_deleted(SaleId(1)).unwrap();
    let lot = &desk.book.lots(&rmb()).unwrap()[0];
    assert_eq!(lot.remaining_amount, dec!(1000));
    assert_eq!(lot.adjusted_amount, Decimal::ZERO);
    assert_eq!(desk.balance(desk.rmb_cash), dec!(1000));
    desk.assert_reconciled();
}

#[test]
fn purchase_reversal_needs_the_currency_still_on_hand() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    let vault = desk
        .book
        .open_account(NewAccount::cash(OWNER, "RMB vault", rmb()))
        .unwrap()
        .id;
    desk.book
        .transfer(desk.rmb_cash, vault, dec!(1000), None)
        .unwrap();

    assert_invalid_reversal(desk.book.on_purchase_deleted(PurchaseId(1)));
    assert_eq!(desk.balance(desk.rmb_cash), Decimal::ZERO);
    assert_eq!(desk.balance(vault), dec!(1000));
    assert_eq!(desk.book.inventory_summary(&rmb()).unwrap().lot_count, 1);

    desk.book
        .transfer(vault, desk.rmb_cash, dec!(1000), None)
        .unwrap();
    desk.book.on_purchase_deleted(PurchaseId(1)).unwrap();
    assert_eq!(desk.balance(desk.twd_cash), STARTING_TWD);
    desk.assert_reconciled();
}

#[test]
fn sale_reversal_needs_the_proceeds_still_on_hand() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.sell(1, dec!(400), dec!(1800)).unwrap();
    let till = desk.balance(desk.twd_cash);
    desk.book.withdraw(desk.twd_cash, till, Some("bank run")).unwrap();

    assert_invalid_reversal(desk.book.on_sale_deleted(SaleId(1)));
    assert_eq!(desk.book.lots(&rmb()).unwrap()[0].remaining_amount, dec!(600));
    assert_eq!(desk.balance(desk.twd_cash), Decimal::ZERO);
    desk.assert_reconciled();

    desk.book.deposit(desk.twd_cash, dec!(1800), None).unwrap();
    desk.book.on_sale_deleted(SaleId(1)).unwrap();
    assert_eq!(desk.balance(desk.rmb_cash), dec!(1000));
    desk.assert_reconciled();
}

#[test]
fn accounts_behind_live_records_stay_active() {
    let desk = Desk::new();
    desk.buy(1, dec!(1000), dec!(4.0), t(1));
    desk.sell(1, dec!(1000), dec!(4500)).unwrap();
    assert_eq!(desk.balance(desk.rmb_cash), Decimal::ZERO);

    assert!(matches!(
        desk.book.deactivate_account(desk.rmb_cash),
        Err(EngineError::Validation(_))
    ));
    assert!(desk.book.account(desk.rmb_cash).unwrap().is_active);

    desk.book.on_sale_deleted(SaleId(1)).unwrap();
    assert_eq!(desk.balance(desk.rmb_cash), dec!(1000));
    desk.assert_reconciled();
}
