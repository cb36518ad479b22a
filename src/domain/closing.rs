//! Stock batch lifecycle: one open batch per store, closing is final and
//! immediately opens the next numbered batch.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::domain::stock_number;
use crate::error::{AppError, LedgerError};
use crate::models::Stock;

const STOCK_COLUMNS: &str = "id, store_id, stock_number, created_at, is_active, closed_at";

pub fn map_stock_row(row: &rusqlite::Row) -> Result<Stock, rusqlite::Error> {
  Ok(Stock {
    id: row.get(0)?,
    store_id: row.get(1)?,
    stock_number: row.get(2)?,
    created_at: row.get(3)?,
    is_active: row.get::<_, i64>(4)? == 1,
    closed_at: row.get(5)?,
  })
}

pub fn load_stock(conn: &Connection, stock_id: i64) -> Result<Stock, AppError> {
  conn
    .query_row(
      &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?1"),
      params![stock_id],
      map_stock_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound { entity: "stock", id: stock_id }.into())
}

pub fn get_active_stock(conn: &Connection, store_id: i64) -> Result<Option<Stock>, AppError> {
  let stock = conn
    .query_row(
      &format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE store_id = ?1 AND is_active = 1 LIMIT 1"),
      params![store_id],
      map_stock_row,
    )
    .optional()?;
  Ok(stock)
}

/// Most recently created closed batch of a store.
pub fn previous_closed_stock(conn: &Connection, store_id: i64) -> Result<Option<Stock>, AppError> {
  let stock = conn
    .query_row(
      &format!(
        "SELECT {STOCK_COLUMNS} FROM stocks WHERE store_id = ?1 AND is_active = 0
         ORDER BY created_at DESC, id DESC LIMIT 1"
      ),
      params![store_id],
      map_stock_row,
    )
    .optional()?;
  Ok(stock)
}

pub fn list_stocks(conn: &Connection, store_id: i64) -> Result<Vec<Stock>, AppError> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {STOCK_COLUMNS} FROM stocks WHERE store_id = ?1 ORDER BY created_at, id"
  ))?;
  let rows = stmt.query_map(params![store_id], map_stock_row)?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

/// Inserts a new open batch numbered after the store's existing ones.
pub fn create_stock(conn: &Connection, store_id: i64, now: DateTime<Utc>) -> Result<Stock, AppError> {
  let existing: Vec<String> = {
    let mut stmt = conn.prepare("SELECT stock_number FROM stocks WHERE store_id = ?1")?;
    let rows = stmt.query_map(params![store_id], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<_, _>>()?
  };
  let stock_number = stock_number::next_stock_number(store_id, existing.iter().map(String::as_str));

  conn.execute(
    "INSERT INTO stocks (store_id, stock_number, created_at, is_active, closed_at) VALUES (?1, ?2, ?3, 1, NULL)",
    params![store_id, stock_number, now.to_rfc3339()],
  )?;
  load_stock(conn, conn.last_insert_rowid())
}

pub fn ensure_active_stock(conn: &Connection, store_id: i64, now: DateTime<Utc>) -> Result<Stock, AppError> {
  match get_active_stock(conn, store_id)? {
    Some(stock) => Ok(stock),
    None => create_stock(conn, store_id, now),
  }
}

/// Closes an open batch and opens its successor in one transaction.
pub fn close_stock(conn: &mut Connection, stock_id: i64, now: DateTime<Utc>) -> Result<(Stock, Stock), AppError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let stock = load_stock(&tx, stock_id)?;
  if !stock.is_active {
    return Err(LedgerError::StockClosed(stock.stock_number).into());
  }

  tx.execute(
    "UPDATE stocks SET is_active = 0, closed_at = ?1 WHERE id = ?2",
    params![now.to_rfc3339(), stock_id],
  )?;
  let next = create_stock(&tx, stock.store_id, now)?;
  let closed = load_stock(&tx, stock_id)?;
  tx.commit()?;
  Ok((closed, next))
}
