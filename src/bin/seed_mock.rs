use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{Duration, Utc};

use scrap_ledger::commands;
use scrap_ledger::db;
use scrap_ledger::domain::scrap::ScrapCategory;
use scrap_ledger::error::AppError;
use scrap_ledger::logging;
use scrap_ledger::models::{ExpenseInput, NewEntryInput, PriceUpdateInput, StoreInput};
use scrap_ledger::AppState;

const DEFAULT_SEED: u64 = 0x5C4A_9001;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  logging::init_logging("info");

  let days = std::env::args()
    .nth(1)
    .and_then(|value| value.parse::<i64>().ok())
    .unwrap_or(45);
  let seed = std::env::var("SCRAP_LEDGER_SEED")
    .ok()
    .and_then(|value| value.parse::<u64>().ok())
    .unwrap_or(DEFAULT_SEED);

  let app_dir = if let Ok(path) = std::env::var("SCRAP_LEDGER_SEED_DIR") {
    PathBuf::from(path)
  } else {
    db::resolve_app_dir()?
  };

  let state = AppState::open(app_dir.clone())?;
  let created = seed_mock_data(&state, days, seed)?;

  println!("Seeded {} entries in {}", created, app_dir.display());
  Ok(())
}

fn seed_mock_data(state: &AppState, days: i64, seed: u64) -> Result<usize, AppError> {
  let mut rng = MockRng::new(seed);

  for category in ScrapCategory::ALL {
    let price = random_amount(&mut rng, 15.0, 650.0);
    commands::set_price(
      state,
      PriceUpdateInput {
        category: category.name().to_string(),
        selling_price: price,
      },
      Some("seed".to_string()),
    )?;
  }

  let stores = [
    ("Kariobangi Yard", "Nairobi"),
    ("Ruiru Depot", "Ruiru"),
    ("Thika Road Scrap", "Thika"),
  ];
  let expense_descriptions = ["Transport", "Loading crew", "Fuel", "Scale repair", "Rent", "Security"];

  let today = Utc::now().date_naive();
  let mut created = 0;
  for (name, location) in stores {
    let detail = commands::add_store(
      state,
      StoreInput {
        name: name.to_string(),
        location: location.to_string(),
      },
    )?;
    let store_id = detail.store.id;

    let mut balance = 0.0;
    for offset in (0..days).rev() {
      if rng.next_u32() % 100 < 20 {
        continue;
      }
      let date = (today - Duration::days(offset)).format("%Y-%m-%d").to_string();

      let mut weights = HashMap::new();
      for category in ScrapCategory::ALL {
        if rng.next_u32() % 100 < 35 {
          weights.insert(category.name().to_string(), random_amount(&mut rng, 1.0, 400.0));
        }
      }

      let entered = random_amount(&mut rng, 0.0, 20000.0);
      let available = balance + entered;
      // Now and then ask for more than is available so the clamp shows up.
      let closing = if rng.next_u32() % 100 < 10 {
        available + random_amount(&mut rng, 1.0, 500.0)
      } else {
        random_amount(&mut rng, 0.0, available.max(1.0))
      };

      let entry = commands::add_entry(
        state,
        store_id,
        NewEntryInput {
          date: date.clone(),
          entered_amount: Some(entered),
          closing_balance: Some(closing),
          weights,
        },
      )?;
      balance = entry.closing_balance;
      created += 1;

      if rng.next_u32() % 100 < 25 {
        let description = expense_descriptions[(rng.next_u32() as usize) % expense_descriptions.len()];
        commands::add_expense(
          state,
          store_id,
          ExpenseInput {
            description: description.to_string(),
            amount: Some(random_amount(&mut rng, 100.0, 3000.0)),
            date: Some(date),
          },
        )?;
      }
    }
  }

  Ok(created)
}

fn random_amount(rng: &mut MockRng, min: f64, max: f64) -> f64 {
  let range = (max - min).max(1.0);
  let base = min + (rng.next_u32() as f64 % range);
  let cents = (rng.next_u32() % 100) as f64 / 100.0;
  ((base + cents) * 100.0).round() / 100.0
}

struct MockRng {
  state: u64,
}

impl MockRng {
  fn new(seed: u64) -> Self {
    Self { state: seed }
  }

  fn next_u32(&mut self) -> u32 {
    self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
    (self.state >> 32) as u32
  }
}
