pub mod alerts;
pub mod audit;
pub mod commands;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod prices;
pub mod reports;
pub mod settings;
pub mod stores;

use std::path::PathBuf;

use db::Db;
use error::AppError;

pub struct AppState {
  pub db: Db,
  pub app_dir: PathBuf,
}

impl AppState {
  /// Opens (and migrates) the ledger database under `app_dir`.
  pub fn open(app_dir: PathBuf) -> Result<Self, AppError> {
    let db = db::init_db(&app_dir)?;
    Ok(Self { db, app_dir })
  }
}
