use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::audit::log::append_price_change;
use crate::domain::balance::round_cents;
use crate::domain::scrap::{CategoryWeights, ScrapCategory};
use crate::domain::validation;
use crate::error::{AppError, LedgerError};
use crate::models::{CategoryPrice, LedgerEntry, PriceChangeRecord};

/// Current unit selling prices, read once per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
  prices: HashMap<ScrapCategory, f64>,
}

impl PriceTable {
  pub fn load(conn: &Connection) -> Result<Self, AppError> {
    let mut stmt = conn.prepare("SELECT name, selling_price FROM scrap_types")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;
    let mut prices = HashMap::new();
    for row in rows {
      let (name, price) = row?;
      if let Some(category) = ScrapCategory::from_name(&name) {
        prices.insert(category, price);
      }
    }
    Ok(Self { prices })
  }

  pub fn from_pairs(pairs: impl IntoIterator<Item = (ScrapCategory, f64)>) -> Self {
    Self {
      prices: pairs.into_iter().collect(),
    }
  }

  pub fn price(&self, category: ScrapCategory) -> f64 {
    self.prices.get(&category).copied().unwrap_or(0.0)
  }

  /// Revenue of a weigh-in at today's prices.
  pub fn revenue(&self, weights: &CategoryWeights) -> f64 {
    round_cents(weights.iter().map(|(category, weight)| weight * self.price(category)).sum())
  }
}

impl LedgerEntry {
  pub fn revenue(&self, prices: &PriceTable) -> f64 {
    prices.revenue(&self.weights)
  }
}

pub fn list_prices(conn: &Connection) -> Result<Vec<CategoryPrice>, AppError> {
  let table = PriceTable::load(conn)?;
  Ok(
    ScrapCategory::ALL
      .iter()
      .map(|category| CategoryPrice {
        category: *category,
        selling_price: table.price(*category),
      })
      .collect(),
  )
}

/// Sets a category's price and logs the change in the same transaction.
pub fn update_selling_price(
  conn: &mut Connection,
  category: &str,
  new_price: f64,
  actor: Option<String>,
  now: DateTime<Utc>,
) -> Result<PriceChangeRecord, AppError> {
  let category = ScrapCategory::parse(category)?;
  validation::ensure_amount_non_negative(new_price, "selling_price")?;
  let new_price = round_cents(new_price);

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let (scrap_type_id, old_price): (i64, f64) = tx
    .query_row(
      "SELECT id, selling_price FROM scrap_types WHERE name = ?1",
      params![category.name()],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| LedgerError::UnknownCategory(category.name().to_string()))?;

  tx.execute(
    "UPDATE scrap_types SET selling_price = ?1 WHERE id = ?2",
    params![new_price, scrap_type_id],
  )?;
  let id = append_price_change(&tx, scrap_type_id, old_price, new_price, actor.clone(), now)?;
  tx.commit()?;

  Ok(PriceChangeRecord {
    id,
    category: category.name().to_string(),
    old_price,
    new_price,
    changed_by: actor,
    changed_at: now.to_rfc3339(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::audit::log::list_price_changes;
  use crate::db;

  #[test]
  fn revenue_uses_current_prices() {
    let mut weights = CategoryWeights::zero();
    weights.set(ScrapCategory::Copper, 2.0);
    weights.set(ScrapCategory::Heavy, 10.0);
    let prices = PriceTable::from_pairs([(ScrapCategory::Copper, 450.0), (ScrapCategory::Heavy, 25.5)]);
    assert_eq!(prices.revenue(&weights), 1155.0);
    assert_eq!(PriceTable::default().revenue(&weights), 0.0);
  }

  #[test]
  fn price_update_appends_log() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      let first = update_selling_price(conn, "copper", 400.0, Some("ops".to_string()), Utc::now())?;
      assert_eq!(first.old_price, 0.0);
      assert_eq!(first.category, "Copper");
      update_selling_price(conn, "Copper", 420.0, None, Utc::now())?;

      let table = PriceTable::load(conn)?;
      assert_eq!(table.price(ScrapCategory::Copper), 420.0);

      let log = list_price_changes(conn, 10)?;
      assert_eq!(log.len(), 2);
      assert_eq!(log[0].old_price, 400.0);
      assert_eq!(log[0].new_price, 420.0);
      assert_eq!(log[1].changed_by.as_deref(), Some("ops"));

      let prices = list_prices(conn)?;
      assert_eq!(prices.len(), 14);
      assert_eq!(prices[6].category, ScrapCategory::Copper);
      Ok(())
    })
    .expect("prices");
  }

  #[test]
  fn price_log_is_append_only() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      update_selling_price(conn, "Brass", 300.0, None, Utc::now())?;
      assert!(conn.execute("UPDATE price_change_log SET new_price = 1", []).is_err());
      assert!(conn.execute("DELETE FROM price_change_log", []).is_err());
      assert_eq!(list_price_changes(conn, 10)?.len(), 1);
      Ok(())
    })
    .expect("append only");
  }

  #[test]
  fn invalid_price_updates_are_rejected() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      let err = update_selling_price(conn, "Aluminium", 10.0, None, Utc::now()).unwrap_err();
      assert!(err.is("UNKNOWN_CATEGORY"));
      let err = update_selling_price(conn, "Brass", -1.0, None, Utc::now()).unwrap_err();
      assert!(err.is("INVALID_AMOUNT"));
      assert!(list_price_changes(conn, 10)?.is_empty());
      Ok(())
    })
    .expect("negative price");
  }
}
