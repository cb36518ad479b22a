use rusqlite::{params, Connection};

use crate::error::{AppError, LedgerError};
use crate::models::Settings;

const KEY_OVERDUE_DAYS: &str = "overdue_days";
const KEY_SWING_THRESHOLD: &str = "profit_swing_threshold";
const KEY_CURRENCY: &str = "currency_label";
const KEY_CASCADE_ON_INSERT: &str = "cascade_on_insert";

pub fn ensure_defaults(conn: &Connection) -> Result<(), AppError> {
  let defaults = Settings::default();
  for (key, value) in entries(&defaults) {
    conn.execute(
      "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
      params![key, value],
    )?;
  }
  Ok(())
}

pub fn get_settings(conn: &Connection) -> Result<Settings, AppError> {
  let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
  let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

  let mut settings = Settings::default();
  for row in rows {
    let (key, value) = row?;
    match key.as_str() {
      KEY_OVERDUE_DAYS => {
        settings.overdue_days = value.parse().unwrap_or(settings.overdue_days);
      }
      KEY_SWING_THRESHOLD => {
        settings.profit_swing_threshold = value.parse().unwrap_or(settings.profit_swing_threshold);
      }
      KEY_CURRENCY => {
        if !value.trim().is_empty() {
          settings.currency_label = value;
        }
      }
      KEY_CASCADE_ON_INSERT => {
        settings.cascade_on_insert = parse_flag(&value).unwrap_or(settings.cascade_on_insert);
      }
      _ => {}
    }
  }

  Ok(settings)
}

pub fn update_settings(conn: &Connection, settings: &Settings) -> Result<(), AppError> {
  if settings.overdue_days < 0 {
    return Err(LedgerError::InvalidInput("overdue_days must not be negative".to_string()).into());
  }
  if !settings.profit_swing_threshold.is_finite() || settings.profit_swing_threshold < 0.0 {
    return Err(LedgerError::InvalidInput("profit_swing_threshold must not be negative".to_string()).into());
  }
  for (key, value) in entries(settings) {
    conn.execute(
      "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
      params![key, value],
    )?;
  }
  Ok(())
}

/// Applies a single `key=value` change, as typed on the command line.
pub fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<(), AppError> {
  let invalid = || AppError::from(LedgerError::InvalidInput(format!("invalid value {value:?} for {key}")));
  match key {
    KEY_OVERDUE_DAYS => settings.overdue_days = value.trim().parse().map_err(|_| invalid())?,
    KEY_SWING_THRESHOLD => settings.profit_swing_threshold = value.trim().parse().map_err(|_| invalid())?,
    KEY_CURRENCY => settings.currency_label = value.trim().to_string(),
    KEY_CASCADE_ON_INSERT => settings.cascade_on_insert = parse_flag(value).ok_or_else(invalid)?,
    _ => return Err(LedgerError::InvalidInput(format!("unknown setting {key}")).into()),
  }
  Ok(())
}

fn entries(settings: &Settings) -> [(&'static str, String); 4] {
  [
    (KEY_OVERDUE_DAYS, settings.overdue_days.to_string()),
    (KEY_SWING_THRESHOLD, settings.profit_swing_threshold.to_string()),
    (KEY_CURRENCY, settings.currency_label.clone()),
    (KEY_CASCADE_ON_INSERT, settings.cascade_on_insert.to_string()),
  ]
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db;

  #[test]
  fn defaults_are_seeded_and_round_trip() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      let settings = get_settings(conn)?;
      assert_eq!(settings, Settings::default());

      let mut changed = settings.clone();
      apply_setting(&mut changed, "cascade_on_insert", "yes")?;
      apply_setting(&mut changed, "overdue_days", "14")?;
      update_settings(conn, &changed)?;

      let reloaded = get_settings(conn)?;
      assert!(reloaded.cascade_on_insert);
      assert_eq!(reloaded.overdue_days, 14);
      assert_eq!(reloaded.currency_label, "KSH");
      Ok(())
    })
    .expect("settings");
  }

  #[test]
  fn unknown_or_malformed_settings_are_rejected() {
    let mut settings = Settings::default();
    assert!(apply_setting(&mut settings, "colour", "blue").is_err());
    assert!(apply_setting(&mut settings, "overdue_days", "soon").is_err());
    assert!(apply_setting(&mut settings, "cascade_on_insert", "maybe").is_err());
    assert_eq!(settings, Settings::default());
  }
}
