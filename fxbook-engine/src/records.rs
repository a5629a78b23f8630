use std::str::FromStr;

use fxbook_core::{
    AccountId, HolderId, LotId, Purchase, PurchaseId, PurchaseStatus, Sale, SaleId, SaleStatus,
};
use fxbook_ledger::{decode_decimal, decode_timestamp, encode_timestamp, LedgerError};
use rusqlite::{params, Connection, Row};

use crate::{EngineError, EngineResult};

const PURCHASE_COLUMNS: &str = "id, lot_id, payment_account_id, deposit_account_id, \
     foreign_amount, unit_cost, home_cost, status, created_at";

const SALE_COLUMNS: &str = "id, foreign_account_id, home_account_id, customer_id, \
     foreign_amount, home_proceeds, realized_profit, settled_amount, status, created_at";

/// Ledger `related_id` for entries produced by a purchase.
pub fn purchase_ref(purchase_id: PurchaseId) -> String {
    format!("purchase:{purchase_id}")
}

/// Ledger `related_id` for entries produced by a sale.
pub fn sale_ref(sale_id: SaleId) -> String {
    format!("sale:{sale_id}")
}

/// Purchase and sale rows: the state-machine carriers.
pub struct RecordStore<'a> {
    conn: &'a Connection,
}

impl<'a> RecordStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_purchase(&self, purchase: &Purchase) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO purchases (id, lot_id, payment_account_id, deposit_account_id,
                 foreign_amount, unit_cost, home_cost, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                purchase.id.get(),
                purchase.lot_id.map(LotId::get),
                purchase.payment_account_id.get(),
                purchase.deposit_account_id.get(),
                purchase.foreign_amount.to_string(),
                purchase.unit_cost.to_string(),
                purchase.home_cost.to_string(),
                purchase.status.as_str(),
                encode_timestamp(purchase.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn purchase(&self, purchase_id: PurchaseId) -> EngineResult<Option<Purchase>> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![purchase_id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_purchase(row)?)),
            None => Ok(None),
        }
    }

    pub fn require_purchase(&self, purchase_id: PurchaseId) -> EngineResult<Purchase> {
        self.purchase(purchase_id)?
            .ok_or_else(|| EngineError::NotFound(format!("purchase {purchase_id}")))
    }

    /// Flip a purchase to `Reversed` and detach it from its deleted lot.
    pub fn mark_purchase_reversed(&self, purchase_id: PurchaseId) -> EngineResult<()> {
        let updated = self.conn.execute(
            "UPDATE purchases SET status = ?1, lot_id = NULL WHERE id = ?2 AND status = ?3",
            params![
                PurchaseStatus::Reversed.as_str(),
                purchase_id.get(),
                PurchaseStatus::Created.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(EngineError::ConcurrencyConflict(format!(
                "purchase {purchase_id} changed state concurrently"
            )));
        }
        Ok(())
    }

    pub fn insert_sale(&self, sale: &Sale) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO sales (id, foreign_account_id, home_account_id, customer_id,
                 foreign_amount, home_proceeds, realized_profit, settled_amount, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                sale.id.get(),
                sale.foreign_account_id.get(),
                sale.home_account_id.get(),
                sale.customer_id.map(HolderId::get),
                sale.foreign_amount.to_string(),
                sale.home_proceeds.to_string(),
                sale.realized_profit.to_string(),
                sale.settled_amount.to_string(),
                sale.status.as_str(),
                encode_timestamp(sale.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn sale(&self, sale_id: SaleId) -> EngineResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![sale_id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_sale(row)?)),
            None => Ok(None),
        }
    }

    pub fn require_sale(&self, sale_id: SaleId) -> EngineResult<Sale> {
        self.sale(sale_id)?
            .ok_or_else(|| EngineError::NotFound(format!("sale {sale_id}")))
    }

    /// Write the mutable columns of a sale: status, profit and settlement
    /// progress.
    pub fn update_sale(&self, sale: &Sale) -> EngineResult<()> {
        let updated = self.conn.execute(
            "UPDATE sales SET realized_profit = ?1, settled_amount = ?2, status = ?3 WHERE id = ?4",
            params![
                sale.realized_profit.to_string(),
                sale.settled_amount.to_string(),
                sale.status.as_str(),
                sale.id.get(),
            ],
        )?;
        if updated == 0 {
            return Err(EngineError::NotFound(format!("sale {}", sale.id)));
        }
        Ok(())
    }

    /// Number of purchases and sales that could still be reversed through
    /// `account_id`.
    pub fn live_references(&self, account_id: AccountId) -> EngineResult<i64> {
        let count = self.conn.query_row(
            "SELECT
                 (SELECT COUNT(*) FROM purchases
                  WHERE status = ?2 AND (payment_account_id = ?1 OR deposit_account_id = ?1))
               + (SELECT COUNT(*) FROM sales
                  WHERE status = ?3 AND (foreign_account_id = ?1 OR home_account_id = ?1))",
            params![
                account_id.get(),
                PurchaseStatus::Created.as_str(),
                SaleStatus::Allocated.as_str(),
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// A customer's sales still awaiting payment, oldest first.
    pub fn open_sales_for_customer(
        &self,
        customer_id: HolderId,
        receivable_account: AccountId,
    ) -> EngineResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE customer_id = ?1 AND home_account_id = ?2 AND status = ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            customer_id.get(),
            receivable_account.get(),
            SaleStatus::Allocated.as_str()
        ])?;
        let mut sales = Vec::new();
        while let Some(row) = rows.next()? {
            sales.push(row_to_sale(row)?);
        }
        sales.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(sales)
    }
}

fn row_to_purchase(row: &Row<'_>) -> EngineResult<Purchase> {
    let foreign_amount: String = row.get(4)?;
    let unit_cost: String = row.get(5)?;
    let home_cost: String = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Purchase {
        id: PurchaseId(row.get(0)?),
        lot_id: row.get::<_, Option<i64>>(1)?.map(LotId),
        payment_account_id: AccountId(row.get(2)?),
        deposit_account_id: AccountId(row.get(3)?),
        foreign_amount: decode_decimal(&foreign_amount)?,
        unit_cost: decode_decimal(&unit_cost)?,
        home_cost: decode_decimal(&home_cost)?,
        status: PurchaseStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

fn row_to_sale(row: &Row<'_>) -> EngineResult<Sale> {
    let foreign_amount: String = row.get(4)?;
    let proceeds: String = row.get(5)?;
    let profit: String = row.get(6)?;
    let settled: String = row.get(7)?;
    let status: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(Sale {
        id: SaleId(row.get(0)?),
        foreign_account_id: AccountId(row.get(1)?),
        home_account_id: AccountId(row.get(2)?),
        customer_id: row.get::<_, Option<i64>>(3)?.map(HolderId),
        foreign_amount: decode_decimal(&foreign_amount)?,
        home_proceeds: decode_decimal(&proceeds)?,
        realized_profit: decode_decimal(&profit)?,
        settled_amount: decode_decimal(&settled)?,
        status: SaleStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: decode_timestamp(&created_at)?,
    })
}
