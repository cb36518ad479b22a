use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use scrap_ledger::commands;
use scrap_ledger::db;
use scrap_ledger::error::AppError;
use scrap_ledger::logging;
use scrap_ledger::models::{
  EntryUpdateInput, ExpenseInput, ExportRequest, NewEntryInput, PriceUpdateInput, ReportFilter, StoreInput,
};
use scrap_ledger::AppState;

#[derive(Parser, Debug)]
#[command(name = "scrap-ledger", version, about = "Scrap metal trading ledger")]
struct Cli {
  /// Directory holding the ledger database and exports
  #[arg(long, env = "SCRAP_LEDGER_DATA_DIR", global = true)]
  data_dir: Option<PathBuf>,

  /// Log filter, overridden by RUST_LOG
  #[arg(long, default_value = "warn", global = true)]
  log_level: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  #[command(subcommand)]
  Store(StoreCommand),
  #[command(subcommand)]
  Entry(EntryCommand),
  #[command(subcommand)]
  Expense(ExpenseCommand),
  #[command(subcommand)]
  Price(PriceCommand),
  #[command(subcommand)]
  Stock(StockCommand),
  /// Open stock summaries for every store, raising alerts as needed
  Dashboard,
  /// Financial report over stocks, optionally exported
  Report(ReportArgs),
  #[command(subcommand)]
  Alerts(AlertsCommand),
  #[command(subcommand)]
  Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
  Add {
    #[arg(long)]
    name: String,
    #[arg(long)]
    location: String,
  },
  List,
  Show {
    store_id: i64,
  },
}

#[derive(Subcommand, Debug)]
enum EntryCommand {
  /// Record a day on the store's open stock
  Add {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    date: String,
    #[arg(long)]
    entered: Option<f64>,
    #[arg(long)]
    closing: Option<f64>,
    /// Category weight as NAME=VALUE, repeatable
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,
  },
  /// Replace an entry's amounts; weights are kept unless --weight is given
  Edit {
    entry_id: i64,
    #[arg(long)]
    entered: Option<f64>,
    #[arg(long)]
    closing: Option<f64>,
    /// Replaces every stored weight when given at least once
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,
  },
  Delete {
    entry_id: i64,
  },
  List {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    stock: Option<i64>,
  },
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
  Add {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    description: String,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long)]
    date: Option<String>,
  },
  Edit {
    expense_id: i64,
    #[arg(long)]
    description: String,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long)]
    date: Option<String>,
  },
  Delete {
    expense_id: i64,
  },
  List {
    #[arg(long)]
    store: i64,
  },
}

#[derive(Subcommand, Debug)]
enum PriceCommand {
  List,
  Set {
    category: String,
    price: f64,
    #[arg(long)]
    actor: Option<String>,
  },
  History {
    #[arg(long, default_value_t = 50)]
    limit: i64,
  },
}

#[derive(Subcommand, Debug)]
enum StockCommand {
  /// Close the open stock and start the next one
  Clear {
    #[arg(long)]
    store: i64,
  },
  List {
    #[arg(long)]
    store: i64,
  },
  /// Check the balance chain of a stock
  Verify {
    #[arg(long)]
    store: i64,
    #[arg(long)]
    stock: Option<i64>,
    /// Re-settle every entry from the first one before checking
    #[arg(long)]
    repair: bool,
  },
}

#[derive(Args, Debug)]
struct ReportArgs {
  #[arg(long)]
  from: Option<String>,
  #[arg(long)]
  to: Option<String>,
  #[arg(long)]
  store: Option<i64>,
  #[arg(long)]
  csv: bool,
  #[arg(long)]
  xlsx: bool,
  /// Export file path; defaults to <data dir>/Exports
  #[arg(long)]
  output: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AlertsCommand {
  List {
    /// Include alerts already marked read
    #[arg(long)]
    all: bool,
  },
  Read {
    alert_id: i64,
  },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
  Show,
  Set {
    key: String,
    value: String,
  },
}

fn parse_weight(raw: &str) -> Result<(String, f64), String> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected NAME=VALUE, got {raw}"))?;
  let value = value
    .trim()
    .parse::<f64>()
    .map_err(|_| format!("weight for {name} is not a number: {value}"))?;
  Ok((name.trim().to_string(), value))
}

fn render<T: Serialize>(value: &T) -> Result<String, AppError> {
  Ok(serde_json::to_string_pretty(value)?)
}

fn run(cli: Cli) -> Result<String, AppError> {
  let app_dir = match cli.data_dir {
    Some(dir) => dir,
    None => db::resolve_app_dir()?,
  };
  let state = AppState::open(app_dir)?;

  match cli.command {
    Command::Store(StoreCommand::Add { name, location }) => {
      render(&commands::add_store(&state, StoreInput { name, location })?)
    }
    Command::Store(StoreCommand::List) => render(&commands::list_stores(&state)?),
    Command::Store(StoreCommand::Show { store_id }) => render(&commands::store_detail(&state, store_id)?),

    Command::Entry(EntryCommand::Add {
      store,
      date,
      entered,
      closing,
      weights,
    }) => {
      let input = NewEntryInput {
        date,
        entered_amount: entered,
        closing_balance: closing,
        weights: weights.into_iter().collect::<HashMap<_, _>>(),
      };
      render(&commands::add_entry(&state, store, input)?)
    }
    Command::Entry(EntryCommand::Edit {
      entry_id,
      entered,
      closing,
      weights,
    }) => {
      let weights = if weights.is_empty() {
        commands::entry_weights(&state, entry_id)?
      } else {
        weights.into_iter().collect()
      };
      let input = EntryUpdateInput {
        entered_amount: entered,
        closing_balance: closing,
        weights,
      };
      render(&commands::edit_entry(&state, entry_id, input)?)
    }
    Command::Entry(EntryCommand::Delete { entry_id }) => render(&commands::delete_entry(&state, entry_id)?),
    Command::Entry(EntryCommand::List { store, stock }) => render(&commands::list_entries(&state, store, stock)?),

    Command::Expense(ExpenseCommand::Add {
      store,
      description,
      amount,
      date,
    }) => render(&commands::add_expense(
      &state,
      store,
      ExpenseInput {
        description,
        amount,
        date,
      },
    )?),
    Command::Expense(ExpenseCommand::Edit {
      expense_id,
      description,
      amount,
      date,
    }) => render(&commands::edit_expense(
      &state,
      expense_id,
      ExpenseInput {
        description,
        amount,
        date,
      },
    )?),
    Command::Expense(ExpenseCommand::Delete { expense_id }) => {
      commands::delete_expense(&state, expense_id)?;
      render(&serde_json::json!({ "deleted": expense_id }))
    }
    Command::Expense(ExpenseCommand::List { store }) => render(&commands::list_expenses(&state, store)?),

    Command::Price(PriceCommand::List) => render(&commands::list_prices(&state)?),
    Command::Price(PriceCommand::Set { category, price, actor }) => render(&commands::set_price(
      &state,
      PriceUpdateInput {
        category,
        selling_price: price,
      },
      actor,
    )?),
    Command::Price(PriceCommand::History { limit }) => render(&commands::price_history(&state, limit)?),

    Command::Stock(StockCommand::Clear { store }) => render(&commands::clear_stock(&state, store)?),
    Command::Stock(StockCommand::List { store }) => render(&commands::list_stocks(&state, store)?),
    Command::Stock(StockCommand::Verify { store, stock, repair }) => {
      if repair {
        render(&commands::repair_stock(&state, store, stock)?)
      } else {
        render(&commands::verify_stock(&state, store, stock)?)
      }
    }

    Command::Dashboard => render(&commands::dashboard(&state)?),

    Command::Report(args) => {
      let filter = ReportFilter {
        date_from: args.from,
        date_to: args.to,
        store_id: args.store,
      };
      if !args.csv && !args.xlsx {
        return render(&commands::financial_report(&state, filter)?);
      }
      let mut written = Vec::new();
      if args.csv {
        written.push(commands::export_report_csv(
          &state,
          ExportRequest {
            filter: filter.clone(),
            output_path: args.output.clone().filter(|_| !args.xlsx),
          },
        )?);
      }
      if args.xlsx {
        written.push(commands::export_report_excel(
          &state,
          ExportRequest {
            filter,
            output_path: args.output.clone().filter(|_| !args.csv),
          },
        )?);
      }
      render(&serde_json::json!({ "exported": written }))
    }

    Command::Alerts(AlertsCommand::List { all }) => render(&commands::list_alerts(&state, all)?),
    Command::Alerts(AlertsCommand::Read { alert_id }) => {
      commands::mark_alert_read(&state, alert_id)?;
      render(&serde_json::json!({ "read": alert_id }))
    }

    Command::Settings(SettingsCommand::Show) => render(&commands::get_settings(&state)?),
    Command::Settings(SettingsCommand::Set { key, value }) => {
      render(&commands::set_setting(&state, &key, &value)?)
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  logging::init_logging(&cli.log_level);

  match run(cli) {
    Ok(output) => {
      println!("{output}");
      ExitCode::SUCCESS
    }
    Err(err) => {
      eprintln!("{err}");
      ExitCode::FAILURE
    }
  }
}
