//! Property-based checks of the books under random operation sequences.
//!
//! Invariants verified:
//! - every lot satisfies `remaining == original + adjusted - active allocated`
//! - RMB cash equals remaining inventory and every balance equals its ledger
//!   replay, whatever mix of purchases, sales and reversals ran
//! - allocate followed by reverse restores lots and balances exactly

mod common;

use common::{rmb, t, Desk};
use fxbook_core::{LotId, SaleId};
use fxbook_engine::plan_fifo;
use proptest::{prelude::*, test_runner::TestCaseError};
use rust_decimal::Decimal;

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

#[derive(Clone, Debug)]
enum Op {
    Buy { amount: u32, cost_cents: u32 },
    Sell { amount: u32, proceeds_cents: u32 },
    ReverseSale { pick: usize },
    ReversePurchase { pick: usize },
}

fn op_strat() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..=500, 380u32..=450).prop_map(|(amount, cost_cents)| Op::Buy { amount, cost_cents }),
        (1u32..=400, 380u32..=470)
            .prop_map(|(amount, proceeds_cents)| Op::Sell { amount, proceeds_cents }),
        any::<usize>().prop_map(|pick| Op::ReverseSale { pick }),
        any::<usize>().prop_map(|pick| Op::ReversePurchase { pick }),
    ]
}

fn cents(value: u32) -> Decimal {
    Decimal::new(i64::from(value), 2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn books_stay_reconciled(ops in prop::collection::vec(op_strat(), 1..25)) {
        let desk = Desk::new();
        let mut purchases: Vec<i64> = Vec::new();
        let mut sales: Vec<i64> = Vec::new();
        for (step, op) in ops.iter().enumerate() {
            let id = step as i64 + 1;
            let outcome = match op {
                Op::Buy { amount, cost_cents } => desk
                    .try_buy(id, Decimal::from(*amount), cents(*cost_cents), t(id))
                    .map(|_| purchases.push(id)),
                Op::Sell { amount, proceeds_cents } => {
                    let amount = Decimal::from(*amount);
                    desk.sell(id, amount, amount * cents(*proceeds_cents))
                        .map(|_| sales.push(id))
                }
                Op::ReverseSale { pick } if !sales.is_empty() => {
                    let sale = sales.remove(pick % sales.len());
                    desk.book.on_sale_deleted(SaleId(sale)).map(|_| ())
                }
                Op::ReversePurchase { pick } if !purchases.is_empty() => {
                    let purchase = purchases[pick % purchases.len()];
                    desk.book
                        .on_purchase_deleted(fxbook_core::PurchaseId(purchase))
                        .map(|_| purchases.retain(|p| *p != purchase))
                }
                _ => Ok(()),
            };
            if let Err(err) = outcome {
                prop_assert!(err.is_business_rejection(), "unexpected failure: {}", err);
            }
        }

        for currency in [rmb(), common::twd()] {
            let report = desk.book.check_consistency(&currency).map_err(fail)?;
            prop_assert!(report.is_consistent(), "{:#?}", report);
        }
        for lot in desk.book.lots(&rmb()).map_err(fail)? {
            prop_assert!(lot.remaining_amount >= Decimal::ZERO);
            prop_assert!(lot.remaining_amount <= lot.original_amount);
        }
    }

    #[test]
    fn allocate_then_reverse_is_identity(
        lots in prop::collection::vec((1u32..=300, 390u32..=430), 1..6),
        fraction in 1u32..=100,
    ) {
        let desk = Desk::new();
        for (i, (amount, cost)) in lots.iter().enumerate() {
            desk.try_buy(i as i64 + 1, Decimal::from(*amount), cents(*cost), t(i as i64))
                .map_err(fail)?;
        }
        let before_lots: Vec<(LotId, Decimal)> = desk
            .book
            .lots(&rmb())
            .map_err(fail)?
            .iter()
            .map(|lot| (lot.id, lot.remaining_amount))
            .collect();
        let before_rmb = desk.balance(desk.rmb_cash);
        let before_twd = desk.balance(desk.twd_cash);

        let total: u32 = lots.iter().map(|(amount, _)| amount).sum();
        let requested = Decimal::from((total * fraction / 100).max(1));
        desk.sell(1, requested, requested * cents(425)).map_err(fail)?;
        desk.book.on_sale_deleted(SaleId(1)).map_err(fail)?;

        let after_lots: Vec<(LotId, Decimal)> = desk
            .book
            .lots(&rmb())
            .map_err(fail)?
            .iter()
            .map(|lot| (lot.id, lot.remaining_amount))
            .collect();
        prop_assert_eq!(after_lots, before_lots);
        prop_assert_eq!(desk.balance(desk.rmb_cash), before_rmb);
        prop_assert_eq!(desk.balance(desk.twd_cash), before_twd);
        prop_assert_eq!(desk.balance(desk.book.profit_account_id()), Decimal::ZERO);
    }

    /// Planned slices consume exactly the request and split proceeds exactly.
    #[test]
    fn plan_slices_sum_exactly(
        amounts in prop::collection::vec(1u32..=1_000, 1..8),
        requested in 1u32..=2_000,
        proceeds_cents in 1u32..=10_000_000,
    ) {
        let lots: Vec<fxbook_core::Lot> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| fxbook_core::Lot {
                id: LotId(i as i64 + 1),
                purchase_id: fxbook_core::PurchaseId(i as i64 + 1),
                currency: rmb(),
                original_amount: Decimal::from(*amount),
                remaining_amount: Decimal::from(*amount),
                adjusted_amount: Decimal::ZERO,
                unit_cost: cents(400),
                acquired_at: t(i as i64),
                version: 0,
            })
            .collect();
        let available: u32 = amounts.iter().sum();
        let requested = Decimal::from(requested);
        let proceeds = cents(proceeds_cents);
        match plan_fifo(&rmb(), &lots, requested, proceeds, 2) {
            Ok(plan) => {
                let consumed: Decimal = plan.iter().map(|s| s.amount).sum();
                let split: Decimal = plan.iter().map(|s| s.proceeds).sum();
                prop_assert_eq!(consumed, requested);
                prop_assert_eq!(split, proceeds);
                for slice in &plan {
                    prop_assert_eq!(slice.profit, slice.proceeds - slice.cost);
                }
            }
            Err(_) => prop_assert!(requested > Decimal::from(available)),
        }
    }
}
