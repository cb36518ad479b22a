use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::models::PriceChangeRecord;

/// Appends one row to the price change log. Rows are never updated or deleted;
/// the schema rejects both.
pub fn append_price_change(
  conn: &Connection,
  scrap_type_id: i64,
  old_price: f64,
  new_price: f64,
  changed_by: Option<String>,
  changed_at: DateTime<Utc>,
) -> Result<i64, AppError> {
  conn.execute(
    "INSERT INTO price_change_log (scrap_type_id, old_price, new_price, changed_by, changed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![scrap_type_id, old_price, new_price, changed_by, changed_at.to_rfc3339()],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn list_price_changes(conn: &Connection, limit: i64) -> Result<Vec<PriceChangeRecord>, AppError> {
  let limit = if limit < 1 { 100 } else { limit };
  let mut stmt = conn.prepare(
    "SELECT l.id, s.name, l.old_price, l.new_price, l.changed_by, l.changed_at
     FROM price_change_log l
     JOIN scrap_types s ON s.id = l.scrap_type_id
     ORDER BY l.changed_at DESC, l.id DESC
     LIMIT ?1",
  )?;
  let rows = stmt.query_map(params![limit], |row| {
    Ok(PriceChangeRecord {
      id: row.get(0)?,
      category: row.get(1)?,
      old_price: row.get(2)?,
      new_price: row.get(3)?,
      changed_by: row.get(4)?,
      changed_at: row.get(5)?,
    })
  })?;

  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}
