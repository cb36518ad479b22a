use std::path::Path;

use rust_xlsxwriter::{Color, Format, Workbook};

use crate::error::AppError;
use crate::models::FinancialReport;

pub const REPORT_SHEET: &str = "REPORT";

pub fn export_report(report: &FinancialReport, currency: &str, path: &Path) -> Result<(), AppError> {
  let mut workbook = Workbook::new();
  write_report_sheet(&mut workbook, report, currency)?;
  workbook.save(path)?;
  Ok(())
}

fn write_report_sheet(workbook: &mut Workbook, report: &FinancialReport, currency: &str) -> Result<(), AppError> {
  let sheet = workbook.add_worksheet();
  sheet.set_name(REPORT_SHEET)?;

  let title = Format::new()
    .set_bold()
    .set_font_color(Color::White)
    .set_background_color(Color::RGB(0x1A2433));
  let header = Format::new().set_bold().set_background_color(Color::RGB(0xE2E8F0));
  let label = Format::new().set_bold();
  let money = Format::new().set_num_format(format!("[${currency}] #,##0.00"));
  let percent = Format::new().set_num_format("0.00\"%\"");

  sheet.merge_range(0, 0, 0, 5, "Financial Report", &title)?;
  sheet.write_string(1, 0, format!("Generated {}", report.generated_at))?;

  for (col, text) in ["Store", "Stock", "Status", "Revenue", "Expenses", "Profit"].iter().enumerate() {
    sheet.write_string_with_format(3, col as u16, *text, &header)?;
  }

  let mut row = 4;
  for line in &report.lines {
    sheet.write_string(row, 0, &line.store_name)?;
    sheet.write_string(row, 1, &line.stock_number)?;
    sheet.write_string(row, 2, if line.is_active { "OPEN" } else { "CLOSED" })?;
    sheet.write_number_with_format(row, 3, line.revenue, &money)?;
    sheet.write_number_with_format(row, 4, line.expenses, &money)?;
    sheet.write_number_with_format(row, 5, line.profit, &money)?;
    row += 1;
  }

  row += 1;
  for store in &report.stores {
    sheet.write_string_with_format(row, 0, &store.store_name, &label)?;
    sheet.write_number_with_format(row, 3, store.revenue, &money)?;
    sheet.write_number_with_format(row, 4, store.expenses, &money)?;
    sheet.write_number_with_format(row, 5, store.profit, &money)?;
    row += 1;
  }

  row += 1;
  let totals = [
    ("Total Revenue", report.total_revenue),
    ("Total Expenses", report.total_expenses),
    ("Net Profit", report.net_profit),
  ];
  for (text, value) in totals {
    sheet.write_string_with_format(row, 0, text, &label)?;
    sheet.write_number_with_format(row, 1, value, &money)?;
    row += 1;
  }
  sheet.write_string_with_format(row, 0, "Revenue Growth", &label)?;
  sheet.write_number_with_format(row, 1, report.revenue_growth, &percent)?;

  sheet.set_column_width(0, 28)?;
  sheet.set_column_width(1, 18)?;
  sheet.set_column_width(2, 10)?;
  for col in 3..=5 {
    sheet.set_column_width(col, 16)?;
  }
  Ok(())
}
