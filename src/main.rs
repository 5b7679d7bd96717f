//! Metabase Catalog - command line entry point
//!
//! Lists the tables and saved questions of a Metabase server and reads any of
//! them into a DataFrame.
//!
//! Usage:
//! ```bash
//! export METABASE_DOMAIN=https://metabase.example.com
//! export METABASE_USERNAME=me@example.com
//! export METABASE_PASSWORD=secret      # or: export METABASE_TOKEN=...
//! metabase_catalog list
//! metabase_catalog read "Sample Database.ORDERS" --rows 20
//! metabase_catalog query --database 1 "select count(*) from orders"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use metabase_catalog::config::{
    redact, ENV_DOMAIN, ENV_PASSWORD, ENV_TIMEOUT_SECS, ENV_TOKEN, ENV_USERNAME,
};
use metabase_catalog::{Credentials, DataSource, MetabaseCatalog, MetabaseConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "metabase_catalog", version, about)]
struct Cli {
    /// Metabase server root URL
    #[arg(long, env = ENV_DOMAIN)]
    domain: Option<String>,

    #[arg(long, env = ENV_USERNAME)]
    username: Option<String>,

    #[arg(long, env = ENV_PASSWORD, hide_env_values = true)]
    password: Option<String>,

    /// Pre-issued session token; skips login
    #[arg(long, env = ENV_TOKEN, hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = ENV_TIMEOUT_SECS)]
    timeout_secs: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List databases and their tables
    Databases,

    /// List catalog entries
    List {
        /// Print entries as JSON (credentials omitted)
        #[arg(long)]
        json: bool,
    },

    /// Print the column types of an entry
    Schema { entry: String },

    /// Read an entry and print its first rows
    Read {
        entry: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },

    /// Run a native query against a database
    Query {
        #[arg(long)]
        database: i64,
        sql: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
}

impl Cli {
    fn config(&self) -> metabase_catalog::Result<MetabaseConfig> {
        MetabaseConfig::from_lookup(|key| match key {
            ENV_DOMAIN => self.domain.clone(),
            ENV_USERNAME => self.username.clone(),
            ENV_PASSWORD => self.password.clone(),
            ENV_TOKEN => self.token.clone(),
            ENV_TIMEOUT_SECS => self.timeout_secs.clone(),
            _ => None,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli
        .config()
        .context("Failed to load Metabase configuration")?;
    print_config(&config);

    let mut catalog = MetabaseCatalog::new(config)?;

    match cli.command {
        Command::Databases => {
            for db in catalog.list_databases()? {
                let kind = if db.is_saved_questions {
                    " (saved questions)"
                } else {
                    ""
                };
                println!("[{}] {}{}", db.id, db.name, kind);
                for table in &db.tables {
                    println!("    {} {}", table.id, table.name);
                }
            }
        }
        Command::List { json } => {
            let entries = catalog.enumerate_entries()?;
            if json {
                let listing: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "name": e.name,
                            "description": e.description,
                            "args": e.args,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for entry in &entries {
                    match &entry.description {
                        Some(description) => println!("{}  - {}", entry.name, description),
                        None => println!("{}", entry.name),
                    }
                }
                eprintln!("{} entries", entries.len());
            }
        }
        Command::Schema { entry } => {
            let mut source = catalog.entry(&entry)?.open()?;
            let schema = source.schema()?;
            println!("{} ({} columns)", entry, schema.columns);
            for (name, dtype) in &schema.dtypes {
                println!("  {}: {}", name, dtype);
            }
            source.close();
        }
        Command::Read { entry, rows } => {
            let mut source = catalog.entry(&entry)?.open()?;
            print_head(source.as_mut(), rows)?;
            source.close();
        }
        Command::Query {
            database,
            sql,
            rows,
        } => {
            let mut source = catalog.native_query(database, sql)?;
            print_head(&mut source, rows)?;
            source.close();
        }
    }

    Ok(())
}

fn print_head(source: &mut dyn DataSource, rows: usize) -> anyhow::Result<()> {
    let driver = source.driver();
    let df = source
        .read()
        .with_context(|| format!("Failed to read {}", driver))?;
    println!("{}", df.head(Some(rows)));
    println!("✓ {} rows x {} columns", df.height(), df.width());
    Ok(())
}

/// Print connection info for debugging
fn print_config(config: &MetabaseConfig) {
    eprintln!("METABASE_DOMAIN: {}", config.domain);
    match &config.credentials {
        Credentials::Password { username, .. } => eprintln!("METABASE_USERNAME: {}", username),
        Credentials::Token { token } => eprintln!("METABASE_TOKEN: {}", redact(token)),
    }
}
