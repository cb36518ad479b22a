use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::domain::balance::round_cents;
use crate::domain::{closing, validation};
use crate::error::{AppError, LedgerError};
use crate::models::{Expense, ExpenseInput, Stock, Store, StoreInput};

fn map_store_row(row: &rusqlite::Row) -> Result<Store, rusqlite::Error> {
  Ok(Store {
    id: row.get(0)?,
    name: row.get(1)?,
    location: row.get(2)?,
    created_at: row.get(3)?,
  })
}

fn map_expense_row(row: &rusqlite::Row) -> Result<Expense, rusqlite::Error> {
  Ok(Expense {
    id: row.get(0)?,
    store_id: row.get(1)?,
    description: row.get(2)?,
    amount: row.get(3)?,
    date: row.get(4)?,
  })
}

/// Creates a store together with its first open stock.
pub fn add_store(conn: &mut Connection, input: &StoreInput, now: DateTime<Utc>) -> Result<(Store, Stock), AppError> {
  let name = validation::require_text(&input.name, "name")?;
  let location = validation::require_text(&input.location, "location")?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  tx.execute(
    "INSERT INTO stores (name, location, created_at) VALUES (?1, ?2, ?3)",
    params![name, location, now.to_rfc3339()],
  )?;
  let store = load_store(&tx, tx.last_insert_rowid())?;
  let stock = closing::create_stock(&tx, store.id, now)?;
  tx.commit()?;
  Ok((store, stock))
}

pub fn load_store(conn: &Connection, store_id: i64) -> Result<Store, AppError> {
  conn
    .query_row(
      "SELECT id, name, location, created_at FROM stores WHERE id = ?1",
      params![store_id],
      map_store_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound { entity: "store", id: store_id }.into())
}

pub fn list_stores(conn: &Connection) -> Result<Vec<Store>, AppError> {
  let mut stmt = conn.prepare("SELECT id, name, location, created_at FROM stores ORDER BY name, id")?;
  let rows = stmt.query_map([], map_store_row)?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

struct ValidExpense {
  description: String,
  amount: f64,
  date: String,
}

fn validate_expense(input: &ExpenseInput, today: NaiveDate) -> Result<ValidExpense, LedgerError> {
  let description = validation::require_text(&input.description, "description")?;
  let amount = validation::require_amount(input.amount, "amount")?;
  let date = match input.date.as_deref() {
    Some(raw) if !raw.trim().is_empty() => validation::parse_date(raw)?,
    _ => today,
  };
  Ok(ValidExpense {
    description,
    amount: round_cents(amount),
    date: date.format("%Y-%m-%d").to_string(),
  })
}

/// Records a store expense; a missing date means today.
pub fn add_expense(conn: &Connection, store_id: i64, input: &ExpenseInput, today: NaiveDate) -> Result<Expense, AppError> {
  let valid = validate_expense(input, today)?;
  load_store(conn, store_id)?;
  conn.execute(
    "INSERT INTO expenses (store_id, description, amount, date) VALUES (?1, ?2, ?3, ?4)",
    params![store_id, valid.description, valid.amount, valid.date],
  )?;
  load_expense(conn, conn.last_insert_rowid())
}

pub fn update_expense(conn: &Connection, expense_id: i64, input: &ExpenseInput, today: NaiveDate) -> Result<Expense, AppError> {
  let valid = validate_expense(input, today)?;
  let changed = conn.execute(
    "UPDATE expenses SET description = ?1, amount = ?2, date = ?3 WHERE id = ?4",
    params![valid.description, valid.amount, valid.date, expense_id],
  )?;
  if changed == 0 {
    return Err(LedgerError::NotFound { entity: "expense", id: expense_id }.into());
  }
  load_expense(conn, expense_id)
}

pub fn delete_expense(conn: &Connection, expense_id: i64) -> Result<(), AppError> {
  let changed = conn.execute("DELETE FROM expenses WHERE id = ?1", params![expense_id])?;
  if changed == 0 {
    return Err(LedgerError::NotFound { entity: "expense", id: expense_id }.into());
  }
  Ok(())
}

pub fn load_expense(conn: &Connection, expense_id: i64) -> Result<Expense, AppError> {
  conn
    .query_row(
      "SELECT id, store_id, description, amount, date FROM expenses WHERE id = ?1",
      params![expense_id],
      map_expense_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound { entity: "expense", id: expense_id }.into())
}

/// Store expenses, newest first.
pub fn list_expenses(conn: &Connection, store_id: i64) -> Result<Vec<Expense>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT id, store_id, description, amount, date FROM expenses WHERE store_id = ?1 ORDER BY date DESC, id DESC",
  )?;
  let rows = stmt.query_map(params![store_id], map_expense_row)?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

/// Sum of a store's expenses dated on or before `cutoff`.
pub fn expenses_until(conn: &Connection, store_id: i64, cutoff: NaiveDate) -> Result<f64, AppError> {
  let total: f64 = conn.query_row(
    "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE store_id = ?1 AND date <= ?2",
    params![store_id, cutoff.format("%Y-%m-%d").to_string()],
    |row| row.get(0),
  )?;
  Ok(round_cents(total))
}
