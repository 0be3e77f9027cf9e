// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use log::info;
use std::env;
use std::path::PathBuf;

use ledger_register::entities::{Book, Commodity};
use ledger_register::ports::DeclineAll;
use ledger_register::quickfill_store::SqliteQuickFillStore;
use ledger_register::register::{RegisterType, SplitRegister};
use ledger_register::{load_book_csv, RegisterConfig, Session};

const USAGE: &str = "\
Usage: ledger-register <command> <book.csv> [options]

Commands:
  dump   Print the register as text
  ui     Open the register in the terminal (default)

Options:
  --account <full name>   Show one account (default: general journal)
  --tree                  Include the account's descendants
  --config <file.json>    Register preferences
  --quickfill <file.db>   Persist completion history in SQLite";

struct Options {
    command: String,
    csv_path: PathBuf,
    account: Option<String>,
    tree: bool,
    config_path: Option<PathBuf>,
    quickfill_path: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut positional = Vec::new();
    let mut options = Options {
        command: String::new(),
        csv_path: PathBuf::new(),
        account: None,
        tree: false,
        config_path: None,
        quickfill_path: None,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--account" => options.account = Some(iter.next().context("--account needs a name")?.clone()),
            "--tree" => options.tree = true,
            "--config" => options.config_path = Some(iter.next().context("--config needs a path")?.into()),
            "--quickfill" => options.quickfill_path = Some(iter.next().context("--quickfill needs a path")?.into()),
            "-h" | "--help" => bail!("{}", USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    match positional.as_slice() {
        [csv] => {
            options.command = "ui".to_string();
            options.csv_path = csv.into();
        }
        [command, csv] => {
            options.command = command.clone();
            options.csv_path = csv.into();
        }
        _ => bail!("{}", USAGE),
    }
    Ok(options)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args)?;

    let config = match &options.config_path {
        Some(path) => RegisterConfig::from_file(path)?,
        None => RegisterConfig::default(),
    };

    let currency = Commodity::new(&config.default_currency, config.currency_scale);
    let (book, summary) = load_book_csv(&options.csv_path, config.account_separator, &currency)?;
    info!("Loaded {} transactions from {}", summary.transactions, options.csv_path.display());

    let mut session = Session::new();
    session.open(book);
    let book = session.book_mut().context("No book open")?;

    let reg_type = register_type(book, &options, config.account_separator)?;
    let mut register = SplitRegister::new(reg_type, config, Box::new(DeclineAll));

    let mut store = match &options.quickfill_path {
        Some(path) => Some(SqliteQuickFillStore::open(path)?),
        None => None,
    };
    if let Some(store) = &store {
        register.seed_quickfills(store)?;
    }

    match options.command.as_str() {
        "dump" => run_dump(book, &mut register),
        "ui" => run_ui_mode(book, &mut register, &options)?,
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }

    if let Some(store) = store.as_mut() {
        register.flush_quickfills(store)?;
    }

    session.close();
    Ok(())
}

fn register_type(book: &Book, options: &Options, separator: char) -> Result<RegisterType> {
    let Some(name) = &options.account else {
        return Ok(RegisterType::GeneralJournal);
    };
    let account = book
        .find_account(name, separator)
        .with_context(|| format!("Account '{}' not found", name))?;

    Ok(if options.tree {
        RegisterType::AccountTree(account)
    } else {
        RegisterType::Account(account)
    })
}

fn run_dump(book: &mut Book, register: &mut SplitRegister) {
    register.refresh(book);

    for (vcell, phys_row) in register.table().visible_rows() {
        let cols = register.display_row(book, vcell, phys_row);
        let line: Vec<String> = cols.iter().map(|c| format!("{:<12}", c)).collect();
        println!("{}", line.join(" ").trim_end());
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(book: &mut Book, register: &mut SplitRegister, options: &Options) -> Result<()> {
    let title = match &options.account {
        Some(name) => name.clone(),
        None => "General Journal".to_string(),
    };

    let mut app = ui::App::new(book, register, &title);
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_book: &mut Book, _register: &mut SplitRegister, _options: &Options) -> Result<()> {
    println!("❌ TUI not available. Build with --features tui");
    Ok(())
}
