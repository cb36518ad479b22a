use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::profit;
use crate::error::{AppError, LedgerError};
use crate::models::{Notification, Settings, Stock, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
  OverdueStock,
  ProfitLoss,
}

impl AlertType {
  pub fn as_str(&self) -> &'static str {
    match self {
      AlertType::OverdueStock => "OVERDUE_STOCK",
      AlertType::ProfitLoss => "PROFIT_LOSS",
    }
  }
}

/// Stores a notification unless the same type, store and message already exist.
/// Returns whether a new row was written.
pub fn raise_alert(
  conn: &Connection,
  alert_type: AlertType,
  store_id: i64,
  message: &str,
  now: DateTime<Utc>,
) -> Result<bool, AppError> {
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO alerts (alert_type, store_id, message, created_at, is_read) VALUES (?1, ?2, ?3, ?4, 0)",
    params![alert_type.as_str(), store_id, message, now.to_rfc3339()],
  )?;
  if inserted > 0 {
    info!(alert = alert_type.as_str(), store_id, message, "alert raised");
  }
  Ok(inserted > 0)
}

pub fn overdue_message(stock: &Stock, store: &Store) -> String {
  format!("Stock {} in {} is overdue for clearing.", stock.stock_number, store.name)
}

pub fn swing_message(store: &Store, current: f64, prior: f64) -> String {
  format!("Significant profit/loss change in {}: {current:.2} vs {prior:.2}.", store.name)
}

/// Raises an overdue alert when the open stock is older than `overdue_days` whole days.
pub fn check_overdue(
  conn: &Connection,
  store: &Store,
  stock: &Stock,
  settings: &Settings,
  now: DateTime<Utc>,
) -> Result<bool, AppError> {
  let created = match DateTime::parse_from_rfc3339(&stock.created_at) {
    Ok(created) => created.with_timezone(&Utc),
    Err(_) => return Ok(false),
  };
  if (now - created).num_days() > settings.overdue_days {
    raise_alert(conn, AlertType::OverdueStock, store.id, &overdue_message(stock, store), now)
  } else {
    Ok(false)
  }
}

pub fn check_profit_swing(
  conn: &Connection,
  store: &Store,
  current_profit: f64,
  prior_profit: f64,
  settings: &Settings,
  now: DateTime<Utc>,
) -> Result<bool, AppError> {
  if profit::exceeds_swing(current_profit, prior_profit, settings.profit_swing_threshold) {
    raise_alert(
      conn,
      AlertType::ProfitLoss,
      store.id,
      &swing_message(store, current_profit, prior_profit),
      now,
    )
  } else {
    Ok(false)
  }
}

pub fn list_unread(conn: &Connection) -> Result<Vec<Notification>, AppError> {
  list_alerts(conn, false)
}

pub fn list_alerts(conn: &Connection, include_read: bool) -> Result<Vec<Notification>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT a.id, a.alert_type, a.store_id, s.name, a.message, a.created_at, a.is_read
     FROM alerts a
     JOIN stores s ON s.id = a.store_id
     WHERE (?1 = 1 OR a.is_read = 0)
     ORDER BY a.created_at DESC, a.id DESC",
  )?;
  let rows = stmt.query_map(params![include_read as i64], |row| {
    Ok(Notification {
      id: row.get(0)?,
      alert_type: row.get(1)?,
      store_id: row.get(2)?,
      store_name: row.get(3)?,
      message: row.get(4)?,
      created_at: row.get(5)?,
      is_read: row.get::<_, i64>(6)? == 1,
    })
  })?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

pub fn mark_read(conn: &Connection, alert_id: i64) -> Result<(), AppError> {
  let changed = conn.execute("UPDATE alerts SET is_read = 1 WHERE id = ?1", params![alert_id])?;
  if changed == 0 {
    return Err(LedgerError::NotFound { entity: "alert", id: alert_id }.into());
  }
  Ok(())
}
