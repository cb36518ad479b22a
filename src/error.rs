use rust_xlsxwriter::XlsxError;
use serde::Serialize;
use thiserror::Error;

/// Validation and state failures raised by the ledger itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
  #[error("an entry for stock {stock_number} on {date} already exists")]
  DuplicateDate { stock_number: String, date: String },
  #[error("field {0} is required")]
  MissingRequiredField(&'static str),
  #[error("field {field} must be a non-negative amount, got {value}")]
  InvalidAmount { field: &'static str, value: f64 },
  #[error("weight for {category} must be a non-negative number, got {value}")]
  InvalidWeight { category: String, value: f64 },
  #[error("date must be YYYY-MM-DD, got {0}")]
  InvalidDate(String),
  #[error("unknown scrap category {0}")]
  UnknownCategory(String),
  #[error("stock {0} is already closed")]
  StockClosed(String),
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: i64 },
  #[error("{0}")]
  InvalidInput(String),
}

impl LedgerError {
  pub fn code(&self) -> &'static str {
    match self {
      LedgerError::DuplicateDate { .. } => "DUPLICATE_DATE",
      LedgerError::MissingRequiredField(_) => "MISSING_FIELD",
      LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
      LedgerError::InvalidWeight { .. } => "INVALID_WEIGHT",
      LedgerError::InvalidDate(_) => "INVALID_DATE",
      LedgerError::UnknownCategory(_) => "UNKNOWN_CATEGORY",
      LedgerError::StockClosed(_) => "STOCK_CLOSED",
      LedgerError::NotFound { .. } => "NOT_FOUND",
      LedgerError::InvalidInput(_) => "INVALID_INPUT",
    }
  }
}

#[derive(Debug, Serialize)]
pub struct AppError {
  pub code: String,
  pub message: String,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
    }
  }

  pub fn is(&self, code: &str) -> bool {
    self.code == code
  }
}

impl std::fmt::Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.code, self.message)
  }
}

impl std::error::Error for AppError {}

impl From<LedgerError> for AppError {
  fn from(err: LedgerError) -> Self {
    AppError::new(err.code(), err.to_string())
  }
}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::new("DB_ERROR", err.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new("IO_ERROR", err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::new("JSON_ERROR", err.to_string())
  }
}

impl From<XlsxError> for AppError {
  fn from(err: XlsxError) -> Self {
    AppError::new("EXPORT", err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::new("LOCK_ERROR", "Database lock failed")
  }
}
