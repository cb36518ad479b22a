use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::models::FinancialReport;

pub fn export_report_csv(report: &FinancialReport, currency: &str, path: &Path) -> Result<(), AppError> {
  let mut file = File::create(path)?;
  write_report(&mut file, report, currency)?;
  file.flush()?;
  Ok(())
}

pub fn write_report(out: &mut impl Write, report: &FinancialReport, currency: &str) -> Result<(), AppError> {
  writeln!(out, "store,stock_number,status,revenue,expenses,profit")?;
  for line in &report.lines {
    writeln!(
      out,
      "{},{},{},{:.2},{:.2},{:.2}",
      escape_csv(&line.store_name),
      escape_csv(&line.stock_number),
      if line.is_active { "OPEN" } else { "CLOSED" },
      line.revenue,
      line.expenses,
      line.profit
    )?;
  }

  writeln!(out)?;
  for store in &report.stores {
    writeln!(
      out,
      "{},{},{}",
      escape_csv(&format!("{} total revenue", store.store_name)),
      escape_csv(&money(currency, store.revenue)),
      escape_csv(&format!("profit {}", money(currency, store.profit)))
    )?;
  }
  writeln!(out, "Total Revenue,{}", escape_csv(&money(currency, report.total_revenue)))?;
  writeln!(out, "Total Expenses,{}", escape_csv(&money(currency, report.total_expenses)))?;
  writeln!(out, "Net Profit,{}", escape_csv(&money(currency, report.net_profit)))?;
  writeln!(out, "Revenue Growth,{:.2}%", report.revenue_growth)?;
  Ok(())
}

pub fn money(currency: &str, amount: f64) -> String {
  format!("{currency} {amount:.2}")
}

fn escape_csv(value: &str) -> String {
  if value.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ReportFilter, ReportLine, StoreReportTotals};

  fn report() -> FinancialReport {
    FinancialReport {
      generated_at: "2024-03-10T09:00:00+00:00".to_string(),
      filter: ReportFilter::default(),
      lines: vec![ReportLine {
        store_id: 1,
        store_name: "Yard, East".to_string(),
        stock_number: "STK-1-0001".to_string(),
        is_active: true,
        revenue: 1500.0,
        expenses: 200.5,
        profit: 1299.5,
      }],
      stores: vec![StoreReportTotals {
        store_id: 1,
        store_name: "Yard, East".to_string(),
        revenue: 1500.0,
        expenses: 200.5,
        profit: 1299.5,
      }],
      total_revenue: 1500.0,
      total_expenses: 200.5,
      net_profit: 1299.5,
      previous_period_revenue: 0.0,
      revenue_growth: 0.0,
    }
  }

  #[test]
  fn lines_are_escaped_and_totals_formatted() {
    let mut buffer = Vec::new();
    write_report(&mut buffer, &report(), "KSH").expect("write");
    let text = String::from_utf8(buffer).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "store,stock_number,status,revenue,expenses,profit");
    assert_eq!(lines[1], "\"Yard, East\",STK-1-0001,OPEN,1500.00,200.50,1299.50");
    assert!(lines.contains(&"Total Revenue,KSH 1500.00"));
    assert!(lines.contains(&"Net Profit,KSH 1299.50"));
    assert_eq!(lines.last(), Some(&"Revenue Growth,0.00%"));
  }

  #[test]
  fn line_breaks_are_quoted() {
    assert_eq!(escape_csv("Yard\rEast"), "\"Yard\rEast\"");
    assert_eq!(escape_csv("Yard\nEast"), "\"Yard\nEast\"");
    assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    assert_eq!(escape_csv("Yard"), "Yard");
  }
}
