//! Balance-carry arithmetic for a stock ledger.
//!
//! Every entry receives `entered_amount` in cash on its date plus whatever the
//! previous entry (by date) closed with. The operator records how much cash is
//! left at the end of the day; the difference is what was paid out for scrap.
//! An entry can never use more than it was given, so a requested closing
//! balance above the opening amount is pulled down to the opening amount.

use serde::{Deserialize, Serialize};

pub fn round_cents(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
  pub opening_amount: f64,
  pub amount_used: f64,
  pub closing_balance: f64,
  pub clamped: bool,
}

/// Settles one entry against the balance carried in from its predecessor.
pub fn settle(entered_amount: f64, carried_balance: f64, requested_closing: f64) -> Settlement {
  let opening_amount = round_cents(entered_amount + carried_balance);
  let requested_closing = round_cents(requested_closing);
  let used = round_cents(opening_amount - requested_closing);
  if used < 0.0 {
    Settlement {
      opening_amount,
      amount_used: 0.0,
      closing_balance: opening_amount,
      clamped: true,
    }
  } else {
    Settlement {
      opening_amount,
      amount_used: used,
      closing_balance: requested_closing,
      clamped: false,
    }
  }
}

/// The cached balance columns of one stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
  pub id: i64,
  pub date: String,
  pub entered_amount: f64,
  pub opening_amount: f64,
  pub closing_balance: f64,
  pub amount_used: f64,
}

impl ChainRow {
  fn apply(&mut self, settlement: Settlement) {
    self.opening_amount = settlement.opening_amount;
    self.amount_used = settlement.amount_used;
    self.closing_balance = settlement.closing_balance;
  }
}

/// Re-settles `rows` (ascending by date) starting from `seed`. Each row's stored
/// closing balance is its target; the post-clamp closing carries forward.
/// Returns the balance left after the last row.
pub fn carry_forward(seed: f64, rows: &mut [ChainRow]) -> f64 {
  let mut running = seed;
  for row in rows.iter_mut() {
    let settlement = settle(row.entered_amount, running, row.closing_balance);
    row.apply(settlement);
    running = settlement.closing_balance;
  }
  running
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainViolation {
  pub entry_id: i64,
  pub date: String,
  pub expected_opening: f64,
  pub actual_opening: f64,
  pub expected_used: f64,
  pub actual_used: f64,
}

/// Checks that rows (ascending by date) satisfy the carry rule as stored.
pub fn verify_chain(rows: &[ChainRow]) -> Vec<ChainViolation> {
  let mut violations = Vec::new();
  let mut carried = 0.0;
  for row in rows {
    let expected_opening = round_cents(row.entered_amount + carried);
    let expected_used = round_cents(expected_opening - row.closing_balance).max(0.0);
    let consistent = cents_eq(expected_opening, row.opening_amount)
      && cents_eq(expected_used, row.amount_used)
      && row.closing_balance <= row.opening_amount + 0.005;
    if !consistent {
      violations.push(ChainViolation {
        entry_id: row.id,
        date: row.date.clone(),
        expected_opening,
        actual_opening: row.opening_amount,
        expected_used,
        actual_used: row.amount_used,
      });
    }
    carried = row.closing_balance;
  }
  violations
}

fn cents_eq(a: f64, b: f64) -> bool {
  (a - b).abs() < 0.005
}
