use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::domain::scrap::ScrapCategory;
use crate::error::AppError;
use crate::settings;

pub const DB_FILE_NAME: &str = "scrap_ledger.sqlite";
const PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;";

pub struct Db {
  pub conn: Mutex<Connection>,
  pub db_path: PathBuf,
}

pub fn resolve_app_dir() -> Result<PathBuf, AppError> {
  if let Some(portable) = resolve_portable_dir()? {
    return Ok(portable);
  }

  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::new("PATH", "local data directory not found"))?;
  Ok(base.join("ScrapLedger"))
}

pub fn init_db(app_dir: &Path) -> Result<Db, AppError> {
  fs::create_dir_all(app_dir)?;
  let db_path = app_dir.join(DB_FILE_NAME);
  let mut conn = Connection::open(&db_path)?;
  conn.execute_batch(PRAGMAS)?;
  conn.busy_timeout(Duration::from_secs(5))?;

  prepare(&mut conn)?;
  info!(path = %db_path.display(), "database ready");

  Ok(Db {
    conn: Mutex::new(conn),
    db_path,
  })
}

/// Fresh in-memory database with the full schema, for tests and dry runs.
pub fn init_memory_db() -> Result<Db, AppError> {
  let mut conn = Connection::open_in_memory()?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  prepare(&mut conn)?;
  Ok(Db {
    conn: Mutex::new(conn),
    db_path: PathBuf::from(":memory:"),
  })
}

pub fn with_conn<T>(db: &Db, f: impl FnOnce(&mut Connection) -> Result<T, AppError>) -> Result<T, AppError> {
  let mut guard = db.conn.lock()?;
  f(&mut guard)
}

fn prepare(conn: &mut Connection) -> Result<(), AppError> {
  run_migrations(conn)?;
  settings::ensure_defaults(conn)?;
  seed_scrap_types(conn)?;
  Ok(())
}

fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
  )?;

  apply_migration(conn, "001_init", include_str!("../migrations/001_init.sql"))?;
  Ok(())
}

fn apply_migration(conn: &mut Connection, version: &str, sql: &str) -> Result<(), AppError> {
  let exists: i64 = conn.query_row(
    "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
    params![version],
    |row| row.get(0),
  )?;
  if exists > 0 {
    return Ok(());
  }

  let tx = conn.transaction()?;
  tx.execute_batch(sql)?;
  tx.execute(
    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
    params![version, Utc::now().to_rfc3339()],
  )?;
  tx.commit()?;
  debug!(version, "migration applied");
  Ok(())
}

/// Every category gets a price row (0 until an operator sets one).
fn seed_scrap_types(conn: &Connection) -> Result<(), AppError> {
  for category in ScrapCategory::ALL {
    conn.execute(
      "INSERT OR IGNORE INTO scrap_types (name, position, selling_price) VALUES (?1, ?2, 0)",
      params![category.name(), category.position()],
    )?;
  }
  Ok(())
}

fn resolve_portable_dir() -> Result<Option<PathBuf>, AppError> {
  let env_enabled = std::env::var("SCRAP_LEDGER_PORTABLE")
    .ok()
    .map(|value| {
      let value = value.to_ascii_lowercase();
      value == "1" || value == "true" || value == "yes"
    })
    .unwrap_or(false);

  let exe_dir = std::env::current_exe()
    .ok()
    .and_then(|path| path.parent().map(|parent| parent.to_path_buf()));

  if let Some(exe_dir) = exe_dir {
    let flag = exe_dir.join("portable.flag");
    if env_enabled || flag.exists() {
      let data_dir = exe_dir.join("data");
      fs::create_dir_all(&data_dir)?;
      return Ok(Some(data_dir));
    }
  }

  Ok(None)
}
