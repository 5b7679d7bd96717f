//! Catalog of Metabase tables and saved questions
//!
//! Entries are rebuilt from the server's database listing on every
//! enumeration; nothing is cached between calls. Each entry carries the
//! arguments needed to open its source later without enumerating again.
//!
//! Naming:
//! - tables of regular databases: `<database_name>.<table_name>`
//! - saved questions: `questions.<question_id>`, where the id is taken from
//!   the synthetic `card__<id>` table the server lists them as

use crate::config::MetabaseConfig;
use crate::metabase::error::{MetabaseError, Result};
use crate::metabase::{Database, MetabaseApi, SessionClient};
use crate::source::{DataSource, QuestionArgs, QuestionSource, TableArgs, TableSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Prefix of saved-question entry names
pub const QUESTIONS_PREFIX: &str = "questions";

/// Which source an entry opens, and with what
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum SourceArgs {
    MetabaseTable(TableArgs),
    MetabaseQuestion(QuestionArgs),
}

/// A named, openable dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub args: SourceArgs,
    pub config: MetabaseConfig,
}

impl CatalogEntry {
    /// Build the source this entry describes
    ///
    /// The source gets its own session; nothing is fetched yet.
    pub fn open(&self) -> Result<Box<dyn DataSource>> {
        match &self.args {
            SourceArgs::MetabaseTable(args) => {
                Ok(Box::new(TableSource::new(&self.config, args.clone())?))
            }
            SourceArgs::MetabaseQuestion(args) => {
                Ok(Box::new(QuestionSource::new(&self.config, *args)?))
            }
        }
    }
}

/// Turn a database listing into catalog entries, in listing order
pub fn entries_from_databases(
    config: &MetabaseConfig,
    databases: &[Database],
) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();

    for db in databases {
        for table in &db.tables {
            let (name, args) = if db.is_saved_questions {
                let question = match table.id.question_id().map(str::parse::<i64>) {
                    Some(Ok(question)) => question,
                    _ => {
                        warn!(
                            "Skipping saved question with unexpected id '{}' ({})",
                            table.id, table.name
                        );
                        continue;
                    }
                };
                (
                    format!("{}.{}", QUESTIONS_PREFIX, question),
                    SourceArgs::MetabaseQuestion(QuestionArgs { question }),
                )
            } else {
                (
                    format!("{}.{}", db.name, table.name),
                    SourceArgs::MetabaseTable(TableArgs::table(db.id, table.id.clone())),
                )
            };

            entries.push(CatalogEntry {
                name,
                description: table.description.clone(),
                args,
                config: config.clone(),
            });
        }
    }

    entries
}

/// Entry point for browsing a Metabase server
pub struct MetabaseCatalog {
    config: MetabaseConfig,
    api: MetabaseApi,
}

impl MetabaseCatalog {
    pub fn new(config: MetabaseConfig) -> Result<Self> {
        let client = SessionClient::new(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: MetabaseConfig, client: SessionClient) -> Self {
        MetabaseCatalog {
            config,
            api: MetabaseApi::new(client),
        }
    }

    pub fn config(&self) -> &MetabaseConfig {
        &self.config
    }

    /// Databases with nested tables, as reported by the server
    pub fn list_databases(&mut self) -> Result<Vec<Database>> {
        self.api.list_databases()
    }

    /// Fresh list of entries for every table and saved question
    pub fn enumerate_entries(&mut self) -> Result<Vec<CatalogEntry>> {
        let databases = self.list_databases()?;
        let entries = entries_from_databases(&self.config, &databases);
        debug!(
            "Enumerated {} entries from {} databases",
            entries.len(),
            databases.len()
        );
        Ok(entries)
    }

    /// Look up one entry by its qualified name
    pub fn entry(&mut self, name: &str) -> Result<CatalogEntry> {
        self.enumerate_entries()?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| MetabaseError::NotFound(name.to_string()))
    }

    /// Open an ad-hoc native query against a database
    pub fn native_query(&self, database: i64, query: impl Into<String>) -> Result<TableSource> {
        TableSource::new(&self.config, TableArgs::query(database, query))
    }

    /// Open a saved question by id without enumerating
    pub fn question(&self, question: i64) -> Result<QuestionSource> {
        QuestionSource::new(&self.config, QuestionArgs { question })
    }
}
