use std::str::FromStr;

use chrono::{DateTime, Utc};
use fxbook_core::{
    Allocation, AllocationId, AllocationStatus, Currency, Lot, LotId, PurchaseId, SaleId,
};
use fxbook_ledger::{decode_decimal, decode_timestamp, encode_timestamp, LedgerError};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, EngineResult};

const LOT_COLUMNS: &str = "id, purchase_id, currency, original_amount, remaining_amount, \
     adjusted_amount, unit_cost, acquired_at, version";

const ALLOCATION_COLUMNS: &str = "id, lot_id, sale_id, allocated_amount, allocated_cost, \
     realized_profit, status, created_at, reversed_at";

/// Aggregate view of one currency's lots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub currency: Currency,
    pub total_original: Decimal,
    pub total_remaining: Decimal,
    pub total_adjusted: Decimal,
    pub lot_count: usize,
}

/// Lot and allocation persistence over a borrowed connection or transaction.
pub struct LotStore<'a> {
    conn: &'a Connection,
}

impl<'a> LotStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_lot(
        &self,
        purchase_id: PurchaseId,
        currency: &Currency,
        amount: Decimal,
        unit_cost: Decimal,
        acquired_at: DateTime<Utc>,
    ) -> EngineResult<Lot> {
        self.conn.execute(
            "INSERT INTO lots (purchase_id, currency, original_amount, remaining_amount,
                 adjusted_amount, unit_cost, acquired_at, version)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, 0)",
            params![
                purchase_id.get(),
                currency.code(),
                amount.to_string(),
                Decimal::ZERO.to_string(),
                unit_cost.to_string(),
                encode_timestamp(acquired_at),
            ],
        )?;
        self.lot(LotId(self.conn.last_insert_rowid()))
    }

    pub fn lot(&self, lot_id: LotId) -> EngineResult<Lot> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![lot_id.get()])?;
        match rows.next()? {
            Some(row) => row_to_lot(row),
            None => Err(EngineError::NotFound(format!("lot {lot_id}"))),
        }
    }

    pub fn lot_for_purchase(&self, purchase_id: PurchaseId) -> EngineResult<Option<Lot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE purchase_id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![purchase_id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_lot(row)?)),
            None => Ok(None),
        }
    }

    /// Every lot of `currency`, in FIFO order.
    pub fn lots(&self, currency: &Currency) -> EngineResult<Vec<Lot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE currency = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![currency.code()])?;
        let mut lots = Vec::new();
        while let Some(row) = rows.next()? {
            lots.push(row_to_lot(row)?);
        }
        // Amounts are stored as text, so ordering happens here rather than
        // in SQL.
        lots.sort_by(Lot::fifo_cmp);
        Ok(lots)
    }

    /// Lots of `currency` that still hold inventory, in FIFO order.
    pub fn available_lots(&self, currency: &Currency) -> EngineResult<Vec<Lot>> {
        let mut lots = self.lots(currency)?;
        lots.retain(Lot::has_inventory);
        Ok(lots)
    }

    /// Persist new remaining/adjusted amounts, guarded by the version the
    /// caller read.
    pub fn write_amounts(
        &self,
        lot: &Lot,
        remaining: Decimal,
        adjusted: Decimal,
    ) -> EngineResult<Lot> {
        if remaining < Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "lot {} would go negative ({remaining})",
                lot.id
            )));
        }
        let updated = self.conn.execute(
            "UPDATE lots SET remaining_amount = ?1, adjusted_amount = ?2, version = version + 1
             WHERE id = ?3 AND version = ?4",
            params![
                remaining.to_string(),
                adjusted.to_string(),
                lot.id.get(),
                lot.version
            ],
        )?;
        if updated == 0 {
            return Err(stale_lot(lot));
        }
        Ok(Lot {
            remaining_amount: remaining,
            adjusted_amount: adjusted,
            version: lot.version + 1,
            ..lot.clone()
        })
    }

    pub fn delete_lot(&self, lot: &Lot) -> EngineResult<()> {
        let deleted = self.conn.execute(
            "DELETE FROM lots WHERE id = ?1 AND version = ?2",
            params![lot.id.get(), lot.version],
        )?;
        if deleted == 0 {
            return Err(stale_lot(lot));
        }
        Ok(())
    }

    pub fn insert_allocation(
        &self,
        lot_id: LotId,
        sale_id: SaleId,
        amount: Decimal,
        cost: Decimal,
        profit: Decimal,
    ) -> EngineResult<Allocation> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO allocations (lot_id, sale_id, allocated_amount, allocated_cost,
                 realized_profit, status, created_at, reversed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![
                lot_id.get(),
                sale_id.get(),
                amount.to_string(),
                cost.to_string(),
                profit.to_string(),
                AllocationStatus::Active.as_str(),
                encode_timestamp(created_at),
            ],
        )?;
        Ok(Allocation {
            id: AllocationId(self.conn.last_insert_rowid()),
            lot_id,
            sale_id,
            allocated_amount: amount,
            allocated_cost: cost,
            realized_profit: profit,
            status: AllocationStatus::Active,
            created_at,
            reversed_at: None,
        })
    }

    /// Allocations of a sale in creation order, reversed ones included.
    pub fn allocations_for_sale(&self, sale_id: SaleId) -> EngineResult<Vec<Allocation>> {
        self.query_allocations("sale_id", sale_id.get())
    }

    pub fn allocations_for_lot(&self, lot_id: LotId) -> EngineResult<Vec<Allocation>> {
        self.query_allocations("lot_id", lot_id.get())
    }

    pub fn mark_reversed(&self, allocation: &Allocation) -> EngineResult<Allocation> {
        let reversed_at = Utc::now();
        let updated = self.conn.execute(
            "UPDATE allocations SET status = ?1, reversed_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                AllocationStatus::Reversed.as_str(),
                encode_timestamp(reversed_at),
                allocation.id.get(),
                AllocationStatus::Active.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(EngineError::ConcurrencyConflict(format!(
                "allocation {} is no longer active",
                allocation.id
            )));
        }
        Ok(Allocation {
            status: AllocationStatus::Reversed,
            reversed_at: Some(reversed_at),
            ..allocation.clone()
        })
    }

    pub fn inventory_summary(&self, currency: &Currency) -> EngineResult<InventorySummary> {
        let lots = self.lots(currency)?;
        Ok(InventorySummary {
            currency: currency.clone(),
            total_original: lots.iter().map(|lot| lot.original_amount).sum(),
            total_remaining: lots.iter().map(|lot| lot.remaining_amount).sum(),
            total_adjusted: lots.iter().map(|lot| lot.adjusted_amount).sum(),
            lot_count: lots.len(),
        })
    }

    fn query_allocations(&self, column: &str, id: i64) -> EngineResult<Vec<Allocation>> {
        let sql =
            format!("SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE {column} = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        let mut allocations = Vec::new();
        while let Some(row) = rows.next()? {
            allocations.push(row_to_allocation(row)?);
        }
        Ok(allocations)
    }
}

fn stale_lot(lot: &Lot) -> EngineError {
    EngineError::ConcurrencyConflict(format!(
        "lot {} was modified concurrently (expected version {})",
        lot.id, lot.version
    ))
}

fn row_to_lot(row: &Row<'_>) -> EngineResult<Lot> {
    let currency: String = row.get(2)?;
    let original: String = row.get(3)?;
    let remaining: String = row.get(4)?;
    let adjusted: String = row.get(5)?;
    let unit_cost: String = row.get(6)?;
    let acquired_at: String = row.get(7)?;
    Ok(Lot {
        id: LotId(row.get(0)?),
        purchase_id: PurchaseId(row.get(1)?),
        currency: Currency::from_str(&currency).map_err(LedgerError::Serialization)?,
        original_amount: decode_decimal(&original)?,
        remaining_amount: decode_decimal(&remaining)?,
        adjusted_amount: decode_decimal(&adjusted)?,
        unit_cost: decode_decimal(&unit_cost)?,
        acquired_at: decode_timestamp(&acquired_at)?,
        version: row.get(8)?,
    })
}

fn row_to_allocation(row: &Row<'_>) -> EngineResult<Allocation> {
    let amount: String = row.get(3)?;
    let cost: String = row.get(4)?;
    let profit: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let reversed_at: Option<String> = row.get(8)?;
    Ok(Allocation {
        id: AllocationId(row.get(0)?),
        lot_id: LotId(row.get(1)?),
        sale_id: SaleId(row.get(2)?),
        allocated_amount: decode_decimal(&amount)?,
        allocated_cost: decode_decimal(&cost)?,
        realized_profit: decode_decimal(&profit)?,
        status: AllocationStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: decode_timestamp(&created_at)?,
        reversed_at: reversed_at
            .as_deref()
            .map(decode_timestamp)
            .transpose()?,
    })
}
