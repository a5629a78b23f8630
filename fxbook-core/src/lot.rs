use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AllocationId, Currency, LotId, PurchaseId, SaleId};

/// One purchase batch of foreign currency with a fixed cost basis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub purchase_id: PurchaseId,
    pub currency: Currency,
    pub original_amount: Decimal,
    pub remaining_amount: Decimal,
    /// Net of explicit inventory adjustments applied to this lot.
    pub adjusted_amount: Decimal,
    /// Home currency paid per unit of foreign currency.
    pub unit_cost: Decimal,
    pub acquired_at: DateTime<Utc>,
    pub version: i64,
}

impl Lot {
    /// Amount currently held by active allocations, derived from the lot's
    /// own columns.
    pub fn consumed_amount(&self) -> Decimal {
        self.original_amount + self.adjusted_amount - self.remaining_amount
    }

    /// A lot that has never been sold from or adjusted.
    pub fn is_untouched(&self) -> bool {
        self.remaining_amount == self.original_amount && self.adjusted_amount.is_zero()
    }

    pub fn has_inventory(&self) -> bool {
        self.remaining_amount > Decimal::ZERO
    }

    /// FIFO ordering: acquisition time first, lot id breaks ties.
    pub fn fifo_cmp(&self, other: &Self) -> Ordering {
        self.acquired_at
            .cmp(&other.acquired_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Lifecycle of an allocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Active,
    Reversed,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Active => "active",
            AllocationStatus::Reversed => "reversed",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AllocationStatus::Active),
            "reversed" => Ok(AllocationStatus::Reversed),
            other => Err(format!("unknown allocation status: {other}")),
        }
    }
}

/// The part of one lot consumed by one sale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub lot_id: LotId,
    pub sale_id: SaleId,
    pub allocated_amount: Decimal,
    pub allocated_cost: Decimal,
    pub realized_profit: Decimal,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl Allocation {
    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn lot(id: i64, ts: i64) -> Lot {
        Lot {
            id: LotId(id),
            purchase_id: PurchaseId(id),
            currency: Currency::from("RMB"),
            original_amount: dec!(100),
            remaining_amount: dec!(100),
            adjusted_amount: Decimal::ZERO,
            unit_cost: dec!(4.1),
            acquired_at: Utc.timestamp_opt(ts, 0).unwrap(),
            version: 0,
        }
    }

    #[test]
    fn fifo_order_breaks_ties_by_id() {
        let mut lots = vec![lot(3, 10), lot(2, 10), lot(1, 20)];
        lots.sort_by(Lot::fifo_cmp);
        let ids: Vec<i64> = lots.iter().map(|l| l.id.get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn consumed_accounts_for_adjustments() {
        let mut l = lot(1, 0);
        l.remaining_amount = dec!(70);
        l.adjusted_amount = dec!(-10);
        assert_eq!(l.consumed_amount(), dec!(20));
        assert!(!l.is_untouched());
    }
}
