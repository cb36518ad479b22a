pub const STOCK_PREFIX: &str = "STK";

/// Numeric suffix after the last hyphen, if it parses.
pub fn parse_suffix(stock_number: &str) -> Option<u32> {
  stock_number.rsplit('-').next()?.trim().parse().ok()
}

/// Next identifier for a store given the identifiers it already has.
/// Unparseable identifiers are skipped, so a store whose numbers are all
/// malformed starts over at 0001.
pub fn next_stock_number<'a>(store_id: i64, existing: impl IntoIterator<Item = &'a str>) -> String {
  let highest = existing.into_iter().filter_map(parse_suffix).max().unwrap_or(0);
  format_stock_number(store_id, highest.saturating_add(1))
}

pub fn format_stock_number(store_id: i64, sequence: u32) -> String {
  format!("{STOCK_PREFIX}-{store_id}-{sequence:04}")
}
