//! Batch totals, store summaries and the financial report.
//!
//! Revenue is always priced with the current price table. A batch's expenses are
//! the store expenses dated up to a cutoff plus the cash used across its entries.
//! Summaries and the report cut at today; only the prior-batch profit behind the
//! swing alert cuts a closed batch at its creation date.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, Connection};

use crate::domain::balance::round_cents;
use crate::domain::closing::map_stock_row;
use crate::domain::{profit, validation};
use crate::error::AppError;
use crate::ledger;
use crate::models::{
  FinancialReport, ReportFilter, ReportLine, Stock, StockTotals, Store, StoreReportTotals, StoreSummary,
};
use crate::prices::PriceTable;
use crate::stores;

pub const GROWTH_BASELINE_DAYS: i64 = 30;

/// Calendar date a batch was opened on.
pub fn stock_created_date(stock: &Stock) -> Option<NaiveDate> {
  DateTime::parse_from_rfc3339(&stock.created_at)
    .map(|dt| dt.date_naive())
    .or_else(|_| validation::parse_date(stock.created_at.get(..10).unwrap_or("")))
    .ok()
}

/// Cutoff for the prior-batch profit compared by the swing alert.
pub fn expense_cutoff(stock: &Stock, today: NaiveDate) -> NaiveDate {
  if stock.is_active {
    today
  } else {
    stock_created_date(stock).unwrap_or(today)
  }
}

pub fn stock_totals(conn: &Connection, stock: &Stock, prices: &PriceTable, cutoff: NaiveDate) -> Result<StockTotals, AppError> {
  let entries = ledger::list_entries(conn, stock.id)?;
  let total_weight: f64 = entries.iter().map(|entry| entry.weights.total()).sum();
  let total_revenue: f64 = entries.iter().map(|entry| entry.revenue(prices)).sum();
  let amount_used: f64 = entries.iter().map(|entry| entry.amount_used).sum();
  let store_expenses = stores::expenses_until(conn, stock.store_id, cutoff)?;
  let total_expenses = round_cents(store_expenses + amount_used);
  let total_revenue = round_cents(total_revenue);

  Ok(StockTotals {
    total_weight: round_cents(total_weight),
    total_revenue,
    store_expenses,
    amount_used: round_cents(amount_used),
    total_expenses,
    total_profit: profit::profit(total_revenue, total_expenses),
  })
}

pub fn store_summary(
  conn: &Connection,
  store: Store,
  stock: Stock,
  prices: &PriceTable,
  today: NaiveDate,
) -> Result<StoreSummary, AppError> {
  let totals = stock_totals(conn, &stock, prices, today)?;
  Ok(StoreSummary { store, stock, totals })
}

fn filtered_stocks(conn: &Connection, filter: &ReportFilter) -> Result<Vec<(String, Stock)>, AppError> {
  let date_from = match filter.date_from.as_deref() {
    Some(raw) if !raw.trim().is_empty() => Some(validation::parse_date(raw)?.format("%Y-%m-%d").to_string()),
    _ => None,
  };
  let date_to = match filter.date_to.as_deref() {
    Some(raw) if !raw.trim().is_empty() => Some(validation::parse_date(raw)?.format("%Y-%m-%d").to_string()),
    _ => None,
  };

  let mut stmt = conn.prepare(
    "SELECT s.id, s.store_id, s.stock_number, s.created_at, s.is_active, s.closed_at, st.name
     FROM stocks s
     JOIN stores st ON st.id = s.store_id
     WHERE (?1 IS NULL OR substr(s.created_at, 1, 10) >= ?1)
       AND (?2 IS NULL OR substr(s.created_at, 1, 10) <= ?2)
       AND (?3 IS NULL OR s.store_id = ?3)
     ORDER BY st.name, st.id, s.created_at, s.id",
  )?;
  let rows = stmt.query_map(params![date_from, date_to, filter.store_id], |row| {
    Ok((row.get::<_, String>(6)?, map_stock_row(row)?))
  })?;
  let mut items = Vec::new();
  for row in rows {
    items.push(row?);
  }
  Ok(items)
}

/// Revenue of every batch opened more than the baseline window before today.
fn previous_period_revenue(conn: &Connection, prices: &PriceTable, today: NaiveDate) -> Result<f64, AppError> {
  let boundary = (today - Duration::days(GROWTH_BASELINE_DAYS)).format("%Y-%m-%d").to_string();
  let mut stmt = conn.prepare("SELECT id FROM stocks WHERE substr(created_at, 1, 10) < ?1")?;
  let ids = stmt
    .query_map(params![boundary], |row| row.get::<_, i64>(0))?
    .collect::<Result<Vec<_>, _>>()?;

  let mut revenue = 0.0;
  for stock_id in ids {
    revenue += ledger::list_entries(conn, stock_id)?
      .iter()
      .map(|entry| entry.revenue(prices))
      .sum::<f64>();
  }
  Ok(round_cents(revenue))
}

pub fn financial_report(conn: &Connection, filter: &ReportFilter, now: DateTime<Utc>) -> Result<FinancialReport, AppError> {
  let today = now.date_naive();
  let prices = PriceTable::load(conn)?;

  let mut lines = Vec::new();
  let mut stores: Vec<StoreReportTotals> = Vec::new();
  for (store_name, stock) in filtered_stocks(conn, filter)? {
    let totals = stock_totals(conn, &stock, &prices, today)?;
    match stores.iter_mut().find(|item| item.store_id == stock.store_id) {
      Some(item) => {
        item.revenue = round_cents(item.revenue + totals.total_revenue);
        item.expenses = round_cents(item.expenses + totals.total_expenses);
        item.profit = profit::profit(item.revenue, item.expenses);
      }
      None => stores.push(StoreReportTotals {
        store_id: stock.store_id,
        store_name: store_name.clone(),
        revenue: totals.total_revenue,
        expenses: totals.total_expenses,
        profit: totals.total_profit,
      }),
    }
    lines.push(ReportLine {
      store_id: stock.store_id,
      store_name,
      stock_number: stock.stock_number,
      is_active: stock.is_active,
      revenue: totals.total_revenue,
      expenses: totals.total_expenses,
      profit: totals.total_profit,
    });
  }

  let total_revenue = round_cents(lines.iter().map(|line| line.revenue).sum());
  let total_expenses = round_cents(lines.iter().map(|line| line.expenses).sum());
  let previous_period_revenue = previous_period_revenue(conn, &prices, today)?;

  Ok(FinancialReport {
    generated_at: now.to_rfc3339(),
    filter: filter.clone(),
    lines,
    stores,
    total_revenue,
    total_expenses,
    net_profit: profit::profit(total_revenue, total_expenses),
    previous_period_revenue,
    revenue_growth: round_cents(profit::growth_percent(total_revenue, previous_period_revenue)),
  })
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use chrono::TimeZone;

  use super::*;
  use crate::db;
  use crate::domain::closing;
  use crate::models::{ExpenseInput, NewEntryInput, StoreInput};

  fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).single().expect("timestamp")
  }

  fn entry(date: &str, entered: f64, closing: f64, copper: f64) -> NewEntryInput {
    NewEntryInput {
      date: date.to_string(),
      entered_amount: Some(entered),
      closing_balance: Some(closing),
      weights: HashMap::from([("Copper".to_string(), copper)]),
    }
  }

  fn expense(amount: f64, date: &str) -> ExpenseInput {
    ExpenseInput {
      description: "Transport".to_string(),
      amount: Some(amount),
      date: Some(date.to_string()),
    }
  }

  #[test]
  fn totals_count_used_cash_and_dated_expenses() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      crate::prices::update_selling_price(conn, "Copper", 500.0, None, at(2024, 3, 1))?;
      let (store, stock) = stores::add_store(
        conn,
        &StoreInput {
          name: "Yard".to_string(),
          location: "Thika".to_string(),
        },
        at(2024, 3, 1),
      )?;
      ledger::insert_entry(conn, stock.id, &entry("2024-03-02", 1000.0, 700.0, 2.0), at(2024, 3, 2))?;
      ledger::insert_entry(conn, stock.id, &entry("2024-03-03", 0.0, 600.0, 1.5), at(2024, 3, 3))?;
      stores::add_expense(conn, store.id, &expense(50.0, "2024-03-02"), at(2024, 3, 2).date_naive())?;
      stores::add_expense(conn, store.id, &expense(80.0, "2024-04-01"), at(2024, 3, 2).date_naive())?;

      let prices = PriceTable::load(conn)?;
      let totals = stock_totals(conn, &stock, &prices, NaiveDate::from_ymd_opt(2024, 3, 10).expect("date"))?;
      assert_eq!(totals.total_weight, 3.5);
      assert_eq!(totals.total_revenue, 1750.0);
      assert_eq!(totals.amount_used, 400.0);
      assert_eq!(totals.store_expenses, 50.0);
      assert_eq!(totals.total_expenses, 450.0);
      assert_eq!(totals.total_profit, 1300.0);
      Ok(())
    })
    .expect("totals");
  }

  #[test]
  fn report_counts_expenses_up_to_today_for_every_stock() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      let (store, stock) = stores::add_store(
        conn,
        &StoreInput {
          name: "Yard".to_string(),
          location: "Thika".to_string(),
        },
        at(2024, 3, 1),
      )?;
      let today = NaiveDate::from_ymd_opt(2024, 3, 20).expect("date");
      stores::add_expense(conn, store.id, &expense(500.0, "2024-03-05"), today)?;
      stores::add_expense(conn, store.id, &expense(70.0, "2024-03-25"), today)?;
      let (closed, next) = closing::close_stock(conn, stock.id, at(2024, 3, 10))?;

      let report = financial_report(conn, &ReportFilter::default(), at(2024, 3, 20))?;
      assert_eq!(report.lines.len(), 2);
      assert_eq!(report.lines[0].stock_number, closed.stock_number);
      assert_eq!(report.lines[0].expenses, 500.0);
      assert_eq!(report.lines[1].stock_number, next.stock_number);
      assert_eq!(report.lines[1].expenses, 500.0);
      assert_eq!(report.total_expenses, 1000.0);

      let prices = PriceTable::load(conn)?;
      let prior_cutoff = expense_cutoff(&closed, today);
      assert_eq!(prior_cutoff, NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"));
      assert_eq!(stock_totals(conn, &closed, &prices, prior_cutoff)?.store_expenses, 0.0);
      assert_eq!(expense_cutoff(&next, today), today);
      Ok(())
    })
    .expect("cutoff");
  }

  #[test]
  fn report_filters_and_growth() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      crate::prices::update_selling_price(conn, "Copper", 100.0, None, at(2024, 1, 1))?;
      let (a, old_stock) = stores::add_store(
        conn,
        &StoreInput {
          name: "Alpha".to_string(),
          location: "Thika".to_string(),
        },
        at(2024, 1, 1),
      )?;
      ledger::insert_entry(conn, old_stock.id, &entry("2024-01-02", 0.0, 0.0, 10.0), at(2024, 1, 2))?;
      let (_, current) = closing::close_stock(conn, old_stock.id, at(2024, 3, 1))?;
      ledger::insert_entry(conn, current.id, &entry("2024-03-02", 0.0, 0.0, 15.0), at(2024, 3, 2))?;

      let (b, b_stock) = stores::add_store(
        conn,
        &StoreInput {
          name: "Beta".to_string(),
          location: "Ruiru".to_string(),
        },
        at(2024, 3, 5),
      )?;
      ledger::insert_entry(conn, b_stock.id, &entry("2024-03-06", 0.0, 0.0, 5.0), at(2024, 3, 6))?;

      let now = at(2024, 3, 10);
      let report = financial_report(conn, &ReportFilter::default(), now)?;
      assert_eq!(report.lines.len(), 3);
      assert_eq!(report.stores.len(), 2);
      assert_eq!(report.stores[0].store_id, a.id);
      assert_eq!(report.stores[0].revenue, 2500.0);
      assert_eq!(report.total_revenue, 3000.0);
      assert_eq!(report.previous_period_revenue, 1000.0);
      assert_eq!(report.revenue_growth, 200.0);

      let filtered = financial_report(
        conn,
        &ReportFilter {
          date_from: Some("2024-03-01".to_string()),
          date_to: None,
          store_id: Some(b.id),
        },
        now,
      )?;
      assert_eq!(filtered.lines.len(), 1);
      assert_eq!(filtered.lines[0].stock_number, b_stock.stock_number);
      assert_eq!(filtered.net_profit, 500.0);

      let bad = ReportFilter {
        date_from: Some("March".to_string()),
        ..ReportFilter::default()
      };
      assert!(financial_report(conn, &bad, now).unwrap_err().is("INVALID_DATE"));
      Ok(())
    })
    .expect("report");
  }

  #[test]
  fn growth_is_zero_without_old_stocks() {
    let db = db::init_memory_db().expect("db");
    db::with_conn(&db, |conn| {
      let report = financial_report(conn, &ReportFilter::default(), at(2024, 3, 10))?;
      assert!(report.lines.is_empty());
      assert_eq!(report.revenue_growth, 0.0);
      Ok(())
    })
    .expect("empty report");
  }
}
