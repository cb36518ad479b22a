use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::balance::ChainViolation;
use crate::domain::scrap::{CategoryWeights, ScrapCategory};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
  pub overdue_days: i64,
  pub profit_swing_threshold: f64,
  pub currency_label: String,
  pub cascade_on_insert: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      overdue_days: 30,
      profit_swing_threshold: 0.1,
      currency_label: "KSH".to_string(),
      cascade_on_insert: false,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Store {
  pub id: i64,
  pub name: String,
  pub location: String,
  pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreInput {
  pub name: String,
  pub location: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Stock {
  pub id: i64,
  pub store_id: i64,
  pub stock_number: String,
  pub created_at: String,
  pub is_active: bool,
  pub closed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClearedStock {
  pub closed: Stock,
  pub next: Stock,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LedgerEntry {
  pub id: i64,
  pub stock_id: i64,
  pub date: String,
  pub weights: CategoryWeights,
  pub entered_amount: f64,
  pub opening_amount: f64,
  pub closing_balance: f64,
  pub amount_used: f64,
  pub created_at: String,
  pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewEntryInput {
  pub date: String,
  pub entered_amount: Option<f64>,
  pub closing_balance: Option<f64>,
  #[serde(default)]
  pub weights: HashMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EntryUpdateInput {
  pub entered_amount: Option<f64>,
  pub closing_balance: Option<f64>,
  #[serde(default)]
  pub weights: HashMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeletedEntry {
  pub entry_id: i64,
  pub stock_id: i64,
  pub date: String,
  pub recomputed: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Expense {
  pub id: i64,
  pub store_id: i64,
  pub description: String,
  pub amount: f64,
  pub date: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExpenseInput {
  pub description: String,
  pub amount: Option<f64>,
  pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryPrice {
  pub category: ScrapCategory,
  pub selling_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PriceUpdateInput {
  pub category: String,
  pub selling_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PriceChangeRecord {
  pub id: i64,
  pub category: String,
  pub old_price: f64,
  pub new_price: f64,
  pub changed_by: Option<String>,
  pub changed_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
  pub id: i64,
  pub alert_type: String,
  pub store_id: i64,
  pub store_name: String,
  pub message: String,
  pub created_at: String,
  pub is_read: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StockTotals {
  pub total_weight: f64,
  pub total_revenue: f64,
  pub store_expenses: f64,
  pub amount_used: f64,
  pub total_expenses: f64,
  pub total_profit: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreSummary {
  pub store: Store,
  pub stock: Stock,
  pub totals: StockTotals,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Dashboard {
  pub store_summaries: Vec<StoreSummary>,
  pub total_revenue_all: f64,
  pub total_expenses_all: f64,
  pub net_profit_all: f64,
  pub alerts: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreDetail {
  pub store: Store,
  pub current_stock: Stock,
  pub entries: Vec<LedgerEntry>,
  pub expenses: Vec<Expense>,
  pub totals: StockTotals,
  pub categories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReportFilter {
  pub date_from: Option<String>,
  pub date_to: Option<String>,
  pub store_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportLine {
  pub store_id: i64,
  pub store_name: String,
  pub stock_number: String,
  pub is_active: bool,
  pub revenue: f64,
  pub expenses: f64,
  pub profit: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoreReportTotals {
  pub store_id: i64,
  pub store_name: String,
  pub revenue: f64,
  pub expenses: f64,
  pub profit: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinancialReport {
  pub generated_at: String,
  pub filter: ReportFilter,
  pub lines: Vec<ReportLine>,
  pub stores: Vec<StoreReportTotals>,
  pub total_revenue: f64,
  pub total_expenses: f64,
  pub net_profit: f64,
  pub previous_period_revenue: f64,
  pub revenue_growth: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChainReport {
  pub stock_id: i64,
  pub stock_number: String,
  pub entry_count: usize,
  pub violations: Vec<ChainViolation>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExportRequest {
  #[serde(default)]
  pub filter: ReportFilter,
  pub output_path: Option<String>,
}
