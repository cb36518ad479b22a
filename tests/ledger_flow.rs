use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use scrap_ledger::commands;
use scrap_ledger::models::{
  EntryUpdateInput, ExpenseInput, ExportRequest, NewEntryInput, PriceUpdateInput, ReportFilter, StoreInput,
};
use scrap_ledger::AppState;

fn open_state() -> (TempDir, AppState) {
  let dir = tempfile::tempdir().expect("tempdir");
  let state = AppState::open(dir.path().to_path_buf()).expect("open state");
  (dir, state)
}

fn add_store(state: &AppState, name: &str) -> i64 {
  commands::add_store(
    state,
    StoreInput {
      name: name.to_string(),
      location: "Nairobi".to_string(),
    },
  )
  .expect("add store")
  .store
  .id
}

fn entry(date: &str, entered: f64, closing: f64, copper: f64) -> NewEntryInput {
  NewEntryInput {
    date: date.to_string(),
    entered_amount: Some(entered),
    closing_balance: Some(closing),
    weights: HashMap::from([("Copper".to_string(), copper)]),
  }
}

fn set_copper(state: &AppState, price: f64) {
  commands::set_price(
    state,
    PriceUpdateInput {
      category: "Copper".to_string(),
      selling_price: price,
    },
    Some("test".to_string()),
  )
  .expect("price");
}

#[test]
fn stock_lifecycle_report_and_exports() {
  let (dir, state) = open_state();
  set_copper(&state, 450.0);
  let store_id = add_store(&state, "Kariobangi");

  let first = commands::add_entry(&state, store_id, entry("2024-01-01", 100.0, 80.0, 2.0)).expect("first");
  assert_eq!(first.amount_used, 20.0);
  let second = commands::add_entry(&state, store_id, entry("2024-01-05", 50.0, 200.0, 3.0)).expect("second");
  assert_eq!(second.opening_amount, 130.0);
  assert_eq!(second.amount_used, 0.0);
  assert_eq!(second.closing_balance, 130.0);

  let duplicate = commands::add_entry(&state, store_id, entry("2024-01-05", 1.0, 1.0, 0.0)).unwrap_err();
  assert!(duplicate.is("DUPLICATE_DATE"));

  commands::add_expense(
    &state,
    store_id,
    ExpenseInput {
      description: "Transport".to_string(),
      amount: Some(100.0),
      date: Some("2024-01-02".to_string()),
    },
  )
  .expect("expense");

  let detail = commands::store_detail(&state, store_id).expect("detail");
  assert_eq!(detail.entries.len(), 2);
  assert_eq!(detail.categories.len(), 14);
  assert_eq!(detail.totals.total_weight, 5.0);
  assert_eq!(detail.totals.total_revenue, 2250.0);
  assert_eq!(detail.totals.total_expenses, 120.0);
  assert_eq!(detail.totals.total_profit, 2130.0);

  let dashboard = commands::dashboard(&state).expect("dashboard");
  assert_eq!(dashboard.store_summaries.len(), 1);
  assert_eq!(dashboard.total_revenue_all, 2250.0);
  assert_eq!(dashboard.net_profit_all, 2130.0);
  assert!(dashboard.alerts.is_empty());

  let cleared = commands::clear_stock(&state, store_id).expect("clear");
  assert!(!cleared.closed.is_active);
  assert_eq!(cleared.next.stock_number, format!("STK-{store_id}-0002"));
  assert!(commands::store_detail(&state, store_id).expect("detail").entries.is_empty());
  assert_eq!(commands::list_stocks(&state, store_id).expect("stocks").len(), 2);

  let report = commands::financial_report(&state, ReportFilter::default()).expect("report");
  assert_eq!(report.lines.len(), 2);
  assert_eq!(report.lines[0].profit, 2130.0);
  assert_eq!(report.lines[1].expenses, 100.0);
  assert_eq!(report.total_revenue, 2250.0);
  assert_eq!(report.total_expenses, 220.0);
  assert_eq!(report.net_profit, 2030.0);
  assert_eq!(report.revenue_growth, 0.0);

  let csv_path = commands::export_report_csv(&state, ExportRequest::default()).expect("csv");
  assert!(Path::new(&csv_path).starts_with(dir.path().join("Exports")));
  let text = fs::read_to_string(&csv_path).expect("read csv");
  assert!(text.contains(&format!("STK-{store_id}-0001")));
  assert!(text.contains(&format!("STK-{store_id}-0002")));
  assert!(text.contains("Total Revenue,KSH 2250.00"));
  assert!(text.contains("Net Profit,KSH 2030.00"));

  let xlsx_target = dir.path().join("out").join("report.xlsx");
  let xlsx_path = commands::export_report_excel(
    &state,
    ExportRequest {
      filter: ReportFilter::default(),
      output_path: Some(xlsx_target.to_string_lossy().to_string()),
    },
  )
  .expect("xlsx");
  let metadata = fs::metadata(&xlsx_path).expect("xlsx written");
  assert!(metadata.len() > 0);
}

#[test]
fn edits_and_deletes_keep_the_chain() {
  let (_dir, state) = open_state();
  let store_id = add_store(&state, "Ruiru");
  let first = commands::add_entry(&state, store_id, entry("2024-02-01", 100.0, 80.0, 0.0)).expect("first");
  let middle = commands::add_entry(&state, store_id, entry("2024-02-02", 50.0, 100.0, 0.0)).expect("middle");
  let last = commands::add_entry(&state, store_id, entry("2024-02-03", 20.0, 90.0, 0.0)).expect("last");

  let edited = commands::edit_entry(
    &state,
    first.id,
    EntryUpdateInput {
      entered_amount: Some(200.0),
      closing_balance: Some(150.0),
      weights: HashMap::new(),
    },
  )
  .expect("edit");
  assert_eq!(edited.amount_used, 50.0);

  let entries = commands::list_entries(&state, store_id, None).expect("entries");
  assert_eq!(entries[1].opening_amount, 200.0);
  assert_eq!(entries[1].amount_used, 100.0);
  assert_eq!(entries[2].opening_amount, 120.0);

  let deleted = commands::delete_entry(&state, middle.id).expect("delete");
  assert_eq!(deleted.recomputed, 1);
  let entries = commands::list_entries(&state, store_id, None).expect("entries");
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[1].id, last.id);
  assert_eq!(entries[1].opening_amount, 170.0);
  assert_eq!(entries[1].amount_used, 80.0);

  let report = commands::verify_stock(&state, store_id, None).expect("verify");
  assert_eq!(report.entry_count, 2);
  assert!(report.violations.is_empty());

  let missing = commands::edit_entry(&state, last.id, EntryUpdateInput::default()).unwrap_err();
  assert!(missing.is("MISSING_FIELD"));
}

#[test]
fn edit_can_keep_stored_weights() {
  let (_dir, state) = open_state();
  set_copper(&state, 100.0);
  let store_id = add_store(&state, "Juja");
  let first = commands::add_entry(&state, store_id, entry("2024-02-01", 100.0, 80.0, 4.5)).expect("first");

  let weights = commands::entry_weights(&state, first.id).expect("weights");
  assert_eq!(weights.len(), 14);
  assert_eq!(weights.get("Copper"), Some(&4.5));

  let edited = commands::edit_entry(
    &state,
    first.id,
    EntryUpdateInput {
      entered_amount: Some(120.0),
      closing_balance: Some(80.0),
      weights,
    },
  )
  .expect("edit");
  assert_eq!(edited.amount_used, 40.0);
  assert_eq!(commands::store_detail(&state, store_id).expect("detail").totals.total_revenue, 450.0);

  assert!(commands::entry_weights(&state, 9999).unwrap_err().is("NOT_FOUND"));
}

#[test]
fn out_of_order_insert_can_be_repaired_or_cascaded() {
  let (_dir, state) = open_state();
  let store_id = add_store(&state, "Thika");
  commands::add_entry(&state, store_id, entry("2024-01-01", 100.0, 80.0, 0.0)).expect("first");
  commands::add_entry(&state, store_id, entry("2024-01-10", 50.0, 100.0, 0.0)).expect("last");
  commands::add_entry(&state, store_id, entry("2024-01-05", 20.0, 90.0, 0.0)).expect("between");

  let stale = commands::verify_stock(&state, store_id, None).expect("verify");
  assert_eq!(stale.violations.len(), 1);
  let repaired = commands::repair_stock(&state, store_id, None).expect("repair");
  assert!(repaired.violations.is_empty());

  let settings = commands::set_setting(&state, "cascade_on_insert", "true").expect("setting");
  assert!(settings.cascade_on_insert);
  commands::add_entry(&state, store_id, entry("2024-01-07", 10.0, 95.0, 0.0)).expect("cascaded");
  assert!(commands::verify_stock(&state, store_id, None)
    .expect("verify")
    .violations
    .is_empty());

  assert!(commands::set_setting(&state, "nope", "1").unwrap_err().is("INVALID_INPUT"));
}

#[test]
fn dashboard_raises_alerts_once() {
  let (_dir, state) = open_state();
  set_copper(&state, 100.0);
  let store_id = add_store(&state, "Yard");
  commands::add_entry(&state, store_id, entry("2024-01-01", 0.0, 0.0, 10.0)).expect("entry");
  commands::clear_stock(&state, store_id).expect("clear");
  commands::add_entry(&state, store_id, entry("2024-01-02", 0.0, 0.0, 20.0)).expect("entry");

  let dashboard = commands::dashboard(&state).expect("dashboard");
  assert_eq!(dashboard.alerts.len(), 1);
  assert_eq!(dashboard.alerts[0].alert_type, "PROFIT_LOSS");
  assert_eq!(
    dashboard.alerts[0].message,
    "Significant profit/loss change in Yard: 2000.00 vs 1000.00."
  );

  let later = Utc::now() + Duration::days(31);
  let dashboard = commands::dashboard_at(&state, later).expect("dashboard");
  assert_eq!(dashboard.alerts.len(), 2);
  let dashboard = commands::dashboard_at(&state, later).expect("dashboard");
  assert_eq!(dashboard.alerts.len(), 2);

  for alert in &dashboard.alerts {
    commands::mark_alert_read(&state, alert.id).expect("mark read");
  }
  assert!(commands::dashboard_at(&state, later).expect("dashboard").alerts.is_empty());
  assert_eq!(commands::list_alerts(&state, true).expect("all alerts").len(), 2);
}

#[test]
fn data_survives_reopen() {
  let dir = tempfile::tempdir().expect("tempdir");
  let store_id = {
    let state = AppState::open(dir.path().to_path_buf()).expect("open");
    let store_id = add_store(&state, "Persisted");
    commands::add_entry(&state, store_id, entry("2024-04-01", 10.0, 5.0, 0.0)).expect("entry");
    store_id
  };

  let state = AppState::open(dir.path().to_path_buf()).expect("reopen");
  let entries = commands::list_entries(&state, store_id, None).expect("entries");
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].amount_used, 5.0);
  assert_eq!(commands::price_history(&state, 10).expect("history").len(), 0);
}
