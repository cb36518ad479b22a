//! Reconciliation engine over stored stock entries.
//!
//! Entries of a stock form a chain ordered by date. An entry's opening amount
//! is its own entered cash plus the closing balance of the entry dated right
//! before it. Editing or deleting an entry re-settles every later entry of the
//! same stock, carrying each post-clamp closing balance forward. All writes for
//! one operation happen inside a single IMMEDIATE transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::domain::balance::{self, round_cents, ChainRow};
use crate::domain::closing;
use crate::domain::scrap::CategoryWeights;
use crate::domain::validation;
use crate::error::{AppError, LedgerError};
use crate::models::{ChainReport, DeletedEntry, EntryUpdateInput, LedgerEntry, NewEntryInput};
use crate::settings;

const ENTRY_COLUMNS: &str =
  "id, stock_id, date, weights_json, entered_amount, opening_amount, balance, amount_used, created_at, updated_at";

fn map_entry_row(row: &rusqlite::Row) -> Result<LedgerEntry, rusqlite::Error> {
  Ok(LedgerEntry {
    id: row.get(0)?,
    stock_id: row.get(1)?,
    date: row.get(2)?,
    weights: CategoryWeights::from_json(&row.get::<_, String>(3)?),
    entered_amount: row.get(4)?,
    opening_amount: row.get(5)?,
    closing_balance: row.get(6)?,
    amount_used: row.get(7)?,
    created_at: row.get(8)?,
    updated_at: row.get(9)?,
  })
}

pub fn load_entry(conn: &Connection, entry_id: i64) -> Result<LedgerEntry, AppError> {
  conn
    .query_row(
      &format!("SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE id = ?1"),
      params![entry_id],
      map_entry_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::NotFound { entity: "entry", id: entry_id }.into())
}

/// Entries of a stock in date order.
pub fn list_entries(conn: &Connection, stock_id: i64) -> Result<Vec<LedgerEntry>, AppError> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE stock_id = ?1 ORDER BY date"
  ))?;
  let rows = stmt.query_map(params![stock_id], map_entry_row)?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

fn entry_on(conn: &Connection, stock_id: i64, date: &str) -> Result<Option<i64>, AppError> {
  let id = conn
    .query_row(
      "SELECT id FROM stock_entries WHERE stock_id = ?1 AND date = ?2",
      params![stock_id, date],
      |row| row.get(0),
    )
    .optional()?;
  Ok(id)
}

/// Closing balance of the latest entry dated strictly before `date`, or 0.
pub fn predecessor_balance(conn: &Connection, stock_id: i64, date: &str) -> Result<f64, AppError> {
  let balance = conn
    .query_row(
      "SELECT balance FROM stock_entries WHERE stock_id = ?1 AND date < ?2 ORDER BY date DESC LIMIT 1",
      params![stock_id, date],
      |row| row.get::<_, f64>(0),
    )
    .optional()?;
  Ok(balance.unwrap_or(0.0))
}

fn chain_rows(conn: &Connection, stock_id: i64, after: &str) -> Result<Vec<ChainRow>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT id, date, entered_amount, opening_amount, balance, amount_used
     FROM stock_entries
     WHERE stock_id = ?1 AND date > ?2
     ORDER BY date ASC",
  )?;
  let rows = stmt.query_map(params![stock_id, after], |row| {
    Ok(ChainRow {
      id: row.get(0)?,
      date: row.get(1)?,
      entered_amount: row.get(2)?,
      opening_amount: row.get(3)?,
      closing_balance: row.get(4)?,
      amount_used: row.get(5)?,
    })
  })?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

/// Re-settles every entry dated after `after`, seeded with `seed`.
fn cascade_after(conn: &Connection, stock_id: i64, after: &str, seed: f64, stamp: &str) -> Result<usize, AppError> {
  let mut rows = chain_rows(conn, stock_id, after)?;
  balance::carry_forward(seed, &mut rows);

  let mut stmt = conn.prepare(
    "UPDATE stock_entries SET opening_amount = ?1, balance = ?2, amount_used = ?3, updated_at = ?4 WHERE id = ?5",
  )?;
  for row in &rows {
    stmt.execute(params![row.opening_amount, row.closing_balance, row.amount_used, stamp, row.id])?;
  }
  Ok(rows.len())
}

/// Records a new dated entry for a stock.
///
/// Later-dated entries are only re-settled when `cascade_on_insert` is enabled;
/// by default an out-of-order insert leaves them as they were.
pub fn insert_entry(
  conn: &mut Connection,
  stock_id: i64,
  input: &NewEntryInput,
  now: DateTime<Utc>,
) -> Result<LedgerEntry, AppError> {
  let date = validation::parse_date(&input.date)?.format("%Y-%m-%d").to_string();
  let entered = validation::require_amount(input.entered_amount, "entered_amount")?;
  let requested = validation::require_amount(input.closing_balance, "closing_balance")?;
  let weights = CategoryWeights::from_input(&input.weights)?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let stock = closing::load_stock(&tx, stock_id)?;
  if entry_on(&tx, stock_id, &date)?.is_some() {
    warn!(stock = %stock.stock_number, %date, "duplicate entry rejected");
    return Err(
      LedgerError::DuplicateDate {
        stock_number: stock.stock_number,
        date,
      }
      .into(),
    );
  }

  let carried = predecessor_balance(&tx, stock_id, &date)?;
  let settlement = balance::settle(entered, carried, requested);
  let stamp = now.to_rfc3339();
  tx.execute(
    "INSERT INTO stock_entries (stock_id, date, weights_json, entered_amount, opening_amount, balance, amount_used, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      stock_id,
      date,
      weights.to_json(),
      round_cents(entered),
      settlement.opening_amount,
      settlement.closing_balance,
      settlement.amount_used,
      stamp,
      stamp
    ],
  )?;
  let id = tx.last_insert_rowid();

  let recomputed = if settings::get_settings(&tx)?.cascade_on_insert {
    cascade_after(&tx, stock_id, &date, settlement.closing_balance, &stamp)?
  } else {
    0
  };

  let entry = load_entry(&tx, id)?;
  tx.commit()?;
  debug!(
    stock = %stock.stock_number,
    %date,
    opening = settlement.opening_amount,
    clamped = settlement.clamped,
    recomputed,
    "entry added"
  );
  Ok(entry)
}

/// Replaces an entry's amounts and weights, then re-settles every later entry.
pub fn update_entry(
  conn: &mut Connection,
  entry_id: i64,
  input: &EntryUpdateInput,
  now: DateTime<Utc>,
) -> Result<LedgerEntry, AppError> {
  let entered = validation::require_amount(input.entered_amount, "entered_amount")?;
  let requested = validation::require_amount(input.closing_balance, "closing_balance")?;
  let weights = CategoryWeights::from_input(&input.weights)?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let current = load_entry(&tx, entry_id)?;
  let carried = predecessor_balance(&tx, current.stock_id, &current.date)?;
  let settlement = balance::settle(entered, carried, requested);
  let stamp = now.to_rfc3339();
  tx.execute(
    "UPDATE stock_entries
     SET weights_json = ?1, entered_amount = ?2, opening_amount = ?3, balance = ?4, amount_used = ?5, updated_at = ?6
     WHERE id = ?7",
    params![
      weights.to_json(),
      round_cents(entered),
      settlement.opening_amount,
      settlement.closing_balance,
      settlement.amount_used,
      stamp,
      entry_id
    ],
  )?;
  let recomputed = cascade_after(&tx, current.stock_id, &current.date, settlement.closing_balance, &stamp)?;

  let entry = load_entry(&tx, entry_id)?;
  tx.commit()?;
  debug!(entry_id, date = %entry.date, recomputed, "entry updated");
  Ok(entry)
}

/// Removes an entry and re-seeds the rest of the chain from its predecessor.
pub fn delete_entry(conn: &mut Connection, entry_id: i64, now: DateTime<Utc>) -> Result<DeletedEntry, AppError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let current = load_entry(&tx, entry_id)?;
  tx.execute("DELETE FROM stock_entries WHERE id = ?1", params![entry_id])?;

  let carried = predecessor_balance(&tx, current.stock_id, &current.date)?;
  let recomputed = cascade_after(&tx, current.stock_id, &current.date, carried, &now.to_rfc3339())?;
  tx.commit()?;
  debug!(entry_id, date = %current.date, recomputed, "entry deleted");

  Ok(DeletedEntry {
    entry_id,
    stock_id: current.stock_id,
    date: current.date,
    recomputed,
  })
}

/// Re-settles a whole stock from an empty balance, fixing entries left stale
/// by out-of-order inserts.
pub fn repair_stock(conn: &mut Connection, stock_id: i64, now: DateTime<Utc>) -> Result<usize, AppError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  closing::load_stock(&tx, stock_id)?;
  let recomputed = cascade_after(&tx, stock_id, "", 0.0, &now.to_rfc3339())?;
  tx.commit()?;
  Ok(recomputed)
}

pub fn verify_stock(conn: &Connection, stock_id: i64) -> Result<ChainReport, AppError> {
  let stock = closing::load_stock(conn, stock_id)?;
  let rows = chain_rows(conn, stock_id, "")?;
  let violations = balance::verify_chain(&rows);
  if !violations.is_empty() {
    warn!(stock = %stock.stock_number, count = violations.len(), "stock chain out of balance");
  }
  Ok(ChainReport {
    stock_id,
    stock_number: stock.stock_number,
    entry_count: rows.len(),
    violations,
  })
}
