use chrono::NaiveDate;

use crate::error::LedgerError;

pub fn parse_date(date: &str) -> Result<NaiveDate, LedgerError> {
  NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| LedgerError::InvalidDate(date.to_string()))
}

/// A required money field: present, finite and not negative. Zero is allowed.
pub fn require_amount(value: Option<f64>, field: &'static str) -> Result<f64, LedgerError> {
  let amount = value.ok_or(LedgerError::MissingRequiredField(field))?;
  ensure_amount_non_negative(amount, field)?;
  Ok(amount)
}

pub fn ensure_amount_non_negative(amount: f64, field: &'static str) -> Result<(), LedgerError> {
  if !amount.is_finite() || amount < 0.0 {
    Err(LedgerError::InvalidAmount { field, value: amount })
  } else {
    Ok(())
  }
}

pub fn require_text(value: &str, field: &'static str) -> Result<String, LedgerError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    Err(LedgerError::MissingRequiredField(field))
  } else {
    Ok(trimmed.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_is_a_valid_amount() {
    assert_eq!(require_amount(Some(0.0), "entered_amount"), Ok(0.0));
  }

  #[test]
  fn missing_and_negative_amounts_are_distinguished() {
    assert_eq!(
      require_amount(None, "closing_balance"),
      Err(LedgerError::MissingRequiredField("closing_balance"))
    );
    assert!(matches!(
      require_amount(Some(-5.0), "entered_amount"),
      Err(LedgerError::InvalidAmount { field: "entered_amount", .. })
    ));
    assert!(require_amount(Some(f64::NAN), "entered_amount").is_err());
  }

  #[test]
  fn dates_must_be_iso() {
    assert!(parse_date("2024-02-29").is_ok());
    assert_eq!(parse_date("29.02.2024"), Err(LedgerError::InvalidDate("29.02.2024".to_string())));
    assert!(require_text("   ", "name").is_err());
  }
}
