use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::alerts;
use crate::audit::log::list_price_changes;
use crate::db;
use crate::domain::balance::round_cents;
use crate::domain::{closing, profit};
use crate::domain::scrap::ScrapCategory;
use crate::error::{AppError, LedgerError};
use crate::export::{csv, excel};
use crate::ledger;
use crate::models::*;
use crate::prices::{self, PriceTable};
use crate::reports;
use crate::settings;
use crate::stores;
use crate::AppState;

pub fn get_settings(state: &AppState) -> Result<Settings, AppError> {
  db::with_conn(&state.db, |conn| settings::get_settings(conn))
}

pub fn update_settings(state: &AppState, settings_input: Settings) -> Result<Settings, AppError> {
  db::with_conn(&state.db, |conn| {
    settings::update_settings(conn, &settings_input)?;
    info!(?settings_input, "settings updated");
    Ok(settings_input)
  })
}

pub fn set_setting(state: &AppState, key: &str, value: &str) -> Result<Settings, AppError> {
  db::with_conn(&state.db, |conn| {
    let mut current = settings::get_settings(conn)?;
    settings::apply_setting(&mut current, key, value)?;
    settings::update_settings(conn, &current)?;
    info!(key, value, "setting changed");
    Ok(current)
  })
}

pub fn add_store(state: &AppState, input: StoreInput) -> Result<StoreDetail, AppError> {
  let store_id = db::with_conn(&state.db, |conn| {
    let (store, stock) = stores::add_store(conn, &input, Utc::now())?;
    info!(store = %store.name, stock = %stock.stock_number, "store added");
    Ok(store.id)
  })?;
  store_detail(state, store_id)
}

pub fn list_stores(state: &AppState) -> Result<Vec<Store>, AppError> {
  db::with_conn(&state.db, |conn| stores::list_stores(conn))
}

/// Open stock of a store with its entries, expenses and running totals.
pub fn store_detail(state: &AppState, store_id: i64) -> Result<StoreDetail, AppError> {
  let now = Utc::now();
  db::with_conn(&state.db, |conn| {
    let store = stores::load_store(conn, store_id)?;
    let current_stock = closing::ensure_active_stock(conn, store_id, now)?;
    let prices = PriceTable::load(conn)?;
    let totals = reports::stock_totals(conn, &current_stock, &prices, now.date_naive())?;
    Ok(StoreDetail {
      entries: ledger::list_entries(conn, current_stock.id)?,
      expenses: stores::list_expenses(conn, store_id)?,
      store,
      current_stock,
      totals,
      categories: ScrapCategory::ALL.iter().map(|category| category.name().to_string()).collect(),
    })
  })
}

/// Adds a dated entry to the store's open stock.
pub fn add_entry(state: &AppState, store_id: i64, input: NewEntryInput) -> Result<LedgerEntry, AppError> {
  let now = Utc::now();
  db::with_conn(&state.db, |conn| {
    stores::load_store(conn, store_id)?;
    let stock = closing::ensure_active_stock(conn, store_id, now)?;
    ledger::insert_entry(conn, stock.id, &input, now).map_err(|err| {
      warn!(store_id, date = %input.date, error = %err, "entry rejected");
      err
    })
  })
}

pub fn edit_entry(state: &AppState, entry_id: i64, input: EntryUpdateInput) -> Result<LedgerEntry, AppError> {
  db::with_conn(&state.db, |conn| {
    ledger::update_entry(conn, entry_id, &input, Utc::now()).map_err(|err| {
      warn!(entry_id, error = %err, "entry update rejected");
      err
    })
  })
}

/// Stored weights of an entry, keyed by category name, for edits that keep them.
pub fn entry_weights(state: &AppState, entry_id: i64) -> Result<HashMap<String, f64>, AppError> {
  db::with_conn(&state.db, |conn| {
    let entry = ledger::load_entry(conn, entry_id)?;
    Ok(
      entry
        .weights
        .iter()
        .map(|(category, weight)| (category.name().to_string(), weight))
        .collect(),
    )
  })
}

pub fn delete_entry(state: &AppState, entry_id: i64) -> Result<DeletedEntry, AppError> {
  db::with_conn(&state.db, |conn| ledger::delete_entry(conn, entry_id, Utc::now()))
}

/// Entries of one stock, or of the store's open stock when none is given.
pub fn list_entries(state: &AppState, store_id: i64, stock_id: Option<i64>) -> Result<Vec<LedgerEntry>, AppError> {
  db::with_conn(&state.db, |conn| {
    let stock_id = resolve_stock(conn, store_id, stock_id)?;
    ledger::list_entries(conn, stock_id)
  })
}

pub fn add_expense(state: &AppState, store_id: i64, input: ExpenseInput) -> Result<Expense, AppError> {
  db::with_conn(&state.db, |conn| {
    let expense = stores::add_expense(conn, store_id, &input, Utc::now().date_naive())?;
    debug!(store_id, amount = expense.amount, "expense added");
    Ok(expense)
  })
}

pub fn edit_expense(state: &AppState, expense_id: i64, input: ExpenseInput) -> Result<Expense, AppError> {
  db::with_conn(&state.db, |conn| stores::update_expense(conn, expense_id, &input, Utc::now().date_naive()))
}

pub fn delete_expense(state: &AppState, expense_id: i64) -> Result<(), AppError> {
  db::with_conn(&state.db, |conn| stores::delete_expense(conn, expense_id))
}

pub fn list_expenses(state: &AppState, store_id: i64) -> Result<Vec<Expense>, AppError> {
  db::with_conn(&state.db, |conn| {
    stores::load_store(conn, store_id)?;
    stores::list_expenses(conn, store_id)
  })
}

pub fn list_prices(state: &AppState) -> Result<Vec<CategoryPrice>, AppError> {
  db::with_conn(&state.db, |conn| prices::list_prices(conn))
}

pub fn set_price(state: &AppState, input: PriceUpdateInput, actor: Option<String>) -> Result<PriceChangeRecord, AppError> {
  db::with_conn(&state.db, |conn| {
    let record = prices::update_selling_price(conn, &input.category, input.selling_price, actor, Utc::now())?;
    info!(
      category = %record.category,
      old = record.old_price,
      new = record.new_price,
      "selling price changed"
    );
    Ok(record)
  })
}

pub fn price_history(state: &AppState, limit: i64) -> Result<Vec<PriceChangeRecord>, AppError> {
  db::with_conn(&state.db, |conn| list_price_changes(conn, limit))
}

/// Closes the store's open stock and opens the next one.
pub fn clear_stock(state: &AppState, store_id: i64) -> Result<ClearedStock, AppError> {
  let now = Utc::now();
  db::with_conn(&state.db, |conn| {
    stores::load_store(conn, store_id)?;
    let current = closing::ensure_active_stock(conn, store_id, now)?;
    let (closed, next) = closing::close_stock(conn, current.id, now)?;
    info!(closed = %closed.stock_number, next = %next.stock_number, "stock cleared");
    Ok(ClearedStock { closed, next })
  })
}

pub fn list_stocks(state: &AppState, store_id: i64) -> Result<Vec<Stock>, AppError> {
  db::with_conn(&state.db, |conn| {
    stores::load_store(conn, store_id)?;
    closing::list_stocks(conn, store_id)
  })
}

pub fn verify_stock(state: &AppState, store_id: i64, stock_id: Option<i64>) -> Result<ChainReport, AppError> {
  db::with_conn(&state.db, |conn| {
    let stock_id = resolve_stock(conn, store_id, stock_id)?;
    ledger::verify_stock(conn, stock_id)
  })
}

/// Re-settles a stock from its first entry and reports the result.
pub fn repair_stock(state: &AppState, store_id: i64, stock_id: Option<i64>) -> Result<ChainReport, AppError> {
  db::with_conn(&state.db, |conn| {
    let stock_id = resolve_stock(conn, store_id, stock_id)?;
    let recomputed = ledger::repair_stock(conn, stock_id, Utc::now())?;
    info!(stock_id, recomputed, "stock chain rebuilt");
    ledger::verify_stock(conn, stock_id)
  })
}

pub fn dashboard(state: &AppState) -> Result<Dashboard, AppError> {
  dashboard_at(state, Utc::now())
}

/// Builds the dashboard as of `now`, raising overdue and profit swing alerts on the way.
pub fn dashboard_at(state: &AppState, now: DateTime<Utc>) -> Result<Dashboard, AppError> {
  let today = now.date_naive();
  db::with_conn(&state.db, |conn| {
    let config = settings::get_settings(conn)?;
    let prices = PriceTable::load(conn)?;
    let all_stores = stores::list_stores(conn)?;
    if all_stores.is_empty() {
      warn!("no stores registered");
    }

    let mut store_summaries = Vec::new();
    for store in all_stores {
      let stock = match closing::get_active_stock(conn, store.id)? {
        Some(stock) => stock,
        None => match closing::create_stock(conn, store.id, now) {
          Ok(stock) => {
            debug!(store = %store.name, stock = %stock.stock_number, "stock auto-created");
            stock
          }
          Err(err) => {
            error!(store = %store.name, error = %err, "failed to create stock");
            continue;
          }
        },
      };

      let summary = reports::store_summary(conn, store, stock, &prices, today)?;
      alerts::check_overdue(conn, &summary.store, &summary.stock, &config, now)?;
      if let Some(previous) = closing::previous_closed_stock(conn, summary.store.id)? {
        let cutoff = reports::expense_cutoff(&previous, today);
        let prior = reports::stock_totals(conn, &previous, &prices, cutoff)?;
        alerts::check_profit_swing(
          conn,
          &summary.store,
          summary.totals.total_profit,
          prior.total_profit,
          &config,
          now,
        )?;
      }
      store_summaries.push(summary);
    }

    let total_revenue_all: f64 = store_summaries.iter().map(|s| s.totals.total_revenue).sum();
    let total_expenses_all: f64 = store_summaries.iter().map(|s| s.totals.total_expenses).sum();
    Ok(Dashboard {
      total_revenue_all: round_cents(total_revenue_all),
      total_expenses_all: round_cents(total_expenses_all),
      net_profit_all: profit::profit(total_revenue_all, total_expenses_all),
      alerts: alerts::list_unread(conn)?,
      store_summaries,
    })
  })
}

pub fn financial_report(state: &AppState, filter: ReportFilter) -> Result<FinancialReport, AppError> {
  db::with_conn(&state.db, |conn| reports::financial_report(conn, &filter, Utc::now()))
}

pub fn export_report_csv(state: &AppState, request: ExportRequest) -> Result<String, AppError> {
  let output_path = export_path(state, request.output_path.as_deref(), "csv")?;
  db::with_conn(&state.db, |conn| {
    let currency = settings::get_settings(conn)?.currency_label;
    let report = reports::financial_report(conn, &request.filter, Utc::now())?;
    csv::export_report_csv(&report, &currency, &output_path)?;
    info!(path = %output_path.display(), lines = report.lines.len(), "csv report exported");
    Ok(output_path.to_string_lossy().to_string())
  })
}

pub fn export_report_excel(state: &AppState, request: ExportRequest) -> Result<String, AppError> {
  let output_path = export_path(state, request.output_path.as_deref(), "xlsx")?;
  db::with_conn(&state.db, |conn| {
    let currency = settings::get_settings(conn)?.currency_label;
    let report = reports::financial_report(conn, &request.filter, Utc::now())?;
    excel::export_report(&report, &currency, &output_path)?;
    info!(path = %output_path.display(), lines = report.lines.len(), "excel report exported");
    Ok(output_path.to_string_lossy().to_string())
  })
}

pub fn list_alerts(state: &AppState, include_read: bool) -> Result<Vec<Notification>, AppError> {
  db::with_conn(&state.db, |conn| alerts::list_alerts(conn, include_read))
}

pub fn mark_alert_read(state: &AppState, alert_id: i64) -> Result<(), AppError> {
  db::with_conn(&state.db, |conn| alerts::mark_read(conn, alert_id))
}

fn resolve_stock(conn: &rusqlite::Connection, store_id: i64, stock_id: Option<i64>) -> Result<i64, AppError> {
  match stock_id {
    Some(stock_id) => {
      let stock = closing::load_stock(conn, stock_id)?;
      if stock.store_id != store_id {
        return Err(LedgerError::NotFound { entity: "stock", id: stock_id }.into());
      }
      Ok(stock.id)
    }
    None => {
      stores::load_store(conn, store_id)?;
      Ok(closing::ensure_active_stock(conn, store_id, Utc::now())?.id)
    }
  }
}

fn export_path(state: &AppState, requested: Option<&str>, extension: &str) -> Result<PathBuf, AppError> {
  let path = match requested {
    Some(path) if !path.trim().is_empty() => PathBuf::from(path),
    _ => state
      .app_dir
      .join("Exports")
      .join(format!("financial_report_{}.{extension}", Utc::now().format("%Y%m%d_%H%M%S"))),
  };
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)?;
    }
  }
  Ok(path)
}
