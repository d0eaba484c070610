//! Payment dates CLI
//!
//! Command-line tool for filling invoice payment dates from bank statements
//! and managing the access list.

use clap::{Parser, Subcommand, ValueEnum};
use paydate_core::{
    decode_statement, AccessListCache, AccessTable, AppConfig, CsvStore, PaymentDates,
    TabularStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paydate")]
#[command(about = "Fill invoice payment dates from bank statements", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Payments,
    Access,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill blank payment dates in the orders table from a statement
    Reconcile {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Statement file (xlsx, xls, ods or csv)
        #[arg(short, long)]
        statement: PathBuf,

        /// Print the full outcome as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Decode a statement and print the invoices it pays
    ParseStatement {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Statement file (xlsx, xls, ods or csv)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the working range resolved from a source's headers
    Resolve {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Which source to resolve
        #[arg(long, value_enum, default_value = "payments")]
        source: SourceKind,
    },

    /// Print the current access list
    AccessList {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a user to the access table unless already present
    AccessAdd {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Chat ID of the user
        #[arg(long)]
        chat_id: i64,

        /// Display name of the user
        #[arg(long)]
        name: String,
    },

    /// Keep the access list refreshed until interrupted
    WatchAccess {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Create a config file with the default settings
    InitConfig {
        /// Output path for the config file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> paydate_core::Result<()> {
    match command {
        Commands::Reconcile {
            config,
            statement,
            json,
        } => cmd_reconcile(&load_config(config.as_deref())?, &statement, json),
        Commands::ParseStatement { config, file } => {
            cmd_parse_statement(&load_config(config.as_deref())?, &file)
        }
        Commands::Resolve { config, source } => cmd_resolve(&load_config(config.as_deref())?, source),
        Commands::AccessList { config, json } => cmd_access_list(&load_config(config.as_deref())?, json),
        Commands::AccessAdd {
            config,
            chat_id,
            name,
        } => cmd_access_add(&load_config(config.as_deref())?, chat_id, &name),
        Commands::WatchAccess { config } => cmd_watch_access(&load_config(config.as_deref())?),
        Commands::InitConfig { output } => cmd_init_config(&output),
    }
}

fn load_config(path: Option<&Path>) -> paydate_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn open_store(config: &AppConfig) -> Arc<dyn TabularStore> {
    Arc::new(CsvStore::new(&config.store_root))
}

fn cmd_reconcile(config: &AppConfig, statement: &Path, json: bool) -> paydate_core::Result<()> {
    let invoices = decode_statement(statement, &config.statement)?;
    let payments = PaymentDates::new(open_store(config), config.payments_source());

    let outcome = payments.reconcile_statement(&invoices)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print!("{}", outcome.report);
    if !outcome.unresolved.is_empty() {
        let ids: Vec<String> = outcome.unresolved.iter().map(|id| id.to_string()).collect();
        println!();
        println!("Invoices not found in the table: {}", ids.join(", "));
    }

    Ok(())
}

fn cmd_parse_statement(config: &AppConfig, file: &Path) -> paydate_core::Result<()> {
    let invoices = decode_statement(file, &config.statement)?;

    println!("File: {}", file.display());
    println!("Invoices: {}", invoices.len());
    println!();
    println!("Invoice\tDate");
    println!("{}", "-".repeat(24));
    for (id, date) in &invoices {
        println!("{}\t{}", id, date);
    }

    Ok(())
}

fn cmd_resolve(config: &AppConfig, kind: SourceKind) -> paydate_core::Result<()> {
    let source = match kind {
        SourceKind::Payments => config.payments_source(),
        SourceKind::Access => config.access_source(),
    };
    let store = open_store(config);

    let range = paydate_core::establish_working_range(store.as_ref(), &source)?;

    println!("Store: {}", source.store_id);
    println!("Discovery range: {}", source.discovery_range);
    println!("Headers: '{}' .. '{}'", source.headers.first, source.headers.last);
    println!();
    println!("Working range: {}", range.range);
    println!("Span: {}", range.span);

    Ok(())
}

fn cmd_access_list(config: &AppConfig, json: bool) -> paydate_core::Result<()> {
    let table = AccessTable::new(open_store(config), config.access_source());
    let list = table.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("Access list ({}):", list.len());
    for (id, name) in &list {
        println!("  {}\t{}", id, name);
    }

    Ok(())
}

fn cmd_access_add(config: &AppConfig, chat_id: i64, name: &str) -> paydate_core::Result<()> {
    let table = AccessTable::new(open_store(config), config.access_source());

    if table.add_user(chat_id, name)? {
        println!("User {} was added to the access table.", name);
    } else {
        println!("Chat ID {} is already in the access table.", chat_id);
    }

    let cache = AccessListCache::new();
    cache.refresh(&table)?;
    println!("Access list now has {} entries.", cache.snapshot().entries.len());

    Ok(())
}

fn cmd_watch_access(config: &AppConfig) -> paydate_core::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let table = Arc::new(AccessTable::new(open_store(config), config.access_source()));
    let cache = Arc::new(AccessListCache::new());
    let period = config.refresh_interval();

    runtime.block_on(async {
        tracing::info!(interval_secs = period.as_secs(), "watching access list");
        let mut handle = cache.spawn_refresh(table, period);

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to listen for interrupt");
                }
            }
            result = &mut handle => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "refresh task stopped");
                }
            }
        }
        handle.abort();
    });

    let snapshot = cache.snapshot();
    match snapshot.refreshed_at {
        Some(at) => println!("Last refresh at {}: {} entries", at.to_rfc3339(), snapshot.entries.len()),
        None => println!("Access list was never loaded"),
    }

    Ok(())
}

fn cmd_init_config(output: &Path) -> paydate_core::Result<()> {
    let config = AppConfig::default();
    config.save(output)?;

    println!("Created config file: {}", output.display());
    println!();
    println!("Edit the file to point at your tables, then run:");
    println!("  paydate reconcile --config {} --statement <file>", output.display());

    Ok(())
}
