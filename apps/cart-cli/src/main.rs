//! # cart
//!
//! Command-line access to session-bound carts stored in SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          cart CLI                                       │
//! │                                                                         │
//! │  env (CART_*) ──► CliConfig ◄── flags (--db, --session, ...)          │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  Database::new ──► CartContext ──► add / update / remove / show /      │
//! │                                    destroy / purge                      │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                                   JSON on stdout                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//! ```text
//! cart add --id sku1 --qty 1 --price 9.5 --name Widget        # new session, id in output
//! cart --session visitor-1 add --id sku1 --qty 2 --price 9.5 --name Widget --option size=L
//! cart --session visitor-1 add --json '[{"id":"a","qty":1,"price":2,"name":"A"}]'
//! cart --session visitor-1 update --rowid 3f2a... --qty 0
//! cart --session visitor-1 show --newest-first
//! cart purge --older-than-hours 48
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cart_core::{Entries, ItemInput, ItemUpdate};
use cart_db::{Database, DbConfig};

use crate::commands::{item_from_flags, parse_entries, parse_pair, update_from_flags, CartContext};
use crate::config::CliConfig;

/// Longest idle age `purge` accepts: one hundred years.
const MAX_PURGE_HOURS: i64 = 24 * 366 * 100;

/// Session-bound shopping cart ledger
#[derive(Parser)]
#[command(name = "cart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file [env: CART_DB_PATH]
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Session id [env: CART_SESSION_ID]
    #[arg(short, long, global = true)]
    session: Option<String>,

    /// Session key the cart is stored under [env: CART_SESSION_KEY]
    #[arg(long, global = true)]
    session_key: Option<String>,

    /// Allowed product id characters [env: CART_PRODUCT_ID_PATTERN]
    #[arg(long, global = true)]
    id_pattern: Option<String>,

    /// Allowed product name characters [env: CART_PRODUCT_NAME_PATTERN]
    #[arg(long, global = true)]
    name_pattern: Option<String>,

    /// Skip product name checks [env: CART_PRODUCT_NAME_SAFE=false]
    #[arg(long, global = true)]
    no_name_check: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add items, merging quantities into matching rows
    Add {
        /// Item record or list of records as JSON
        #[arg(long, conflicts_with_all = ["id", "qty", "price", "name", "max_ord", "option", "extra"])]
        json: Option<String>,

        /// Product id
        #[arg(long)]
        id: Option<String>,

        /// Quantity
        #[arg(long, allow_negative_numbers = true)]
        qty: Option<f64>,

        /// Unit price
        #[arg(long, allow_negative_numbers = true)]
        price: Option<f64>,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Maximum quantity for this row
        #[arg(long)]
        max_ord: Option<f64>,

        /// Option as key=value (repeatable)
        #[arg(long, value_parser = parse_pair)]
        option: Vec<(String, Value)>,

        /// Passthrough field as key=value (repeatable)
        #[arg(long, value_parser = parse_pair)]
        extra: Vec<(String, Value)>,
    },

    /// Change quantity, price or other fields of existing rows
    Update {
        /// Update record or list of records as JSON
        #[arg(long, conflicts_with_all = ["rowid", "qty", "price", "max_ord", "extra"])]
        json: Option<String>,

        /// Row to change
        #[arg(long, required_unless_present = "json")]
        rowid: Option<String>,

        /// New quantity; zero deletes the row
        #[arg(long, allow_negative_numbers = true)]
        qty: Option<f64>,

        /// New unit price
        #[arg(long, allow_negative_numbers = true)]
        price: Option<f64>,

        /// New maximum quantity (only where the row has one)
        #[arg(long)]
        max_ord: Option<f64>,

        /// Passthrough field as key=value (repeatable)
        #[arg(long, value_parser = parse_pair)]
        extra: Vec<(String, Value)>,
    },

    /// Remove a row
    Remove {
        /// Row to remove
        rowid: String,
    },

    /// Print the cart
    Show {
        /// List the most recently added row first
        #[arg(long)]
        newest_first: bool,
    },

    /// Empty the cart and delete it from the session
    Destroy,

    /// Delete session data idle for longer than the given age
    Purge {
        /// Idle age in hours
        #[arg(long, default_value_t = 24 * 7, value_parser = clap::value_parser!(i64).range(1..=MAX_PURGE_HOURS))]
        older_than_hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    debug!(?config, "Configuration loaded");

    let ledger_config = config.ledger_config()?;
    let db = Database::new(DbConfig::new(&config.db_path)).await?;
    let ctx = CartContext::new(db.clone(), config.session_id.clone(), ledger_config);

    let output = match cli.command {
        Commands::Add {
            json,
            id,
            qty,
            price,
            name,
            max_ord,
            option,
            extra,
        } => {
            let items: Entries<ItemInput> = match json {
                Some(raw) => parse_entries(&raw)?,
                None => item_from_flags(id, qty, price, name, max_ord, option, extra).into(),
            };
            ctx.add(items).await
        }
        Commands::Update {
            json,
            rowid,
            qty,
            price,
            max_ord,
            extra,
        } => {
            let items: Entries<ItemUpdate> = match (json, rowid) {
                (Some(raw), _) => parse_entries(&raw)?,
                (None, Some(rowid)) => update_from_flags(rowid, qty, price, max_ord, extra).into(),
                (None, None) => anyhow::bail!("update needs --rowid or --json"),
            };
            ctx.update(items).await
        }
        Commands::Remove { rowid } => ctx.remove(&rowid).await,
        Commands::Show { newest_first } => ctx.show(newest_first).await,
        Commands::Destroy => ctx.destroy().await,
        Commands::Purge { older_than_hours } => ctx.purge(older_than_hours).await,
    };

    db.close().await;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

/// Environment first, flags on top.
fn resolve_config(cli: &Cli) -> Result<CliConfig> {
    let mut config = CliConfig::load()?;

    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(session) = &cli.session {
        config.session_id = Some(session.clone());
    }
    if let Some(key) = &cli.session_key {
        config.session_key = Some(key.clone());
    }
    if let Some(pattern) = &cli.id_pattern {
        config.product_id_pattern = Some(pattern.clone());
    }
    if let Some(pattern) = &cli.name_pattern {
        config.product_name_pattern = Some(pattern.clone());
    }
    if cli.no_name_check {
        config.product_name_safe = false;
    }

    info!(db = %config.db_path.display(), "Using cart database");
    Ok(config)
}

/// Initializes the tracing subscriber.
///
/// Logs go to stderr; stdout carries only the JSON result.
/// - Override with `RUST_LOG`
/// - Default: INFO, DEBUG for the cart crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cart=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
