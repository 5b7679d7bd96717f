use super::base::SourceBase;
use super::{DataSource, SourceSchema};
use crate::config::MetabaseConfig;
use crate::metabase::error::{MetabaseError, Result};
use crate::metabase::{SessionClient, TableId};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arguments needed to reopen a table or native-query source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableArgs {
    pub database: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableId>,

    /// Native query text; mutually exclusive with `table`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl TableArgs {
    pub fn table(database: i64, table: impl Into<TableId>) -> Self {
        TableArgs {
            database,
            table: Some(table.into()),
            query: None,
        }
    }

    pub fn query(database: i64, query: impl Into<String>) -> Self {
        TableArgs {
            database,
            table: None,
            query: Some(query.into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.is_some() && self.query.is_some() {
            return Err(MetabaseError::ConflictingParameters(format!(
                "database {}: table and query are mutually exclusive",
                self.database
            )));
        }
        Ok(())
    }
}

/// Source backed by a Metabase table or a native query
pub struct TableSource {
    base: SourceBase,
    args: TableArgs,
}

impl TableSource {
    pub fn new(config: &MetabaseConfig, args: TableArgs) -> Result<Self> {
        Self::with_client(SessionClient::new(config)?, args)
    }

    pub fn with_client(client: SessionClient, args: TableArgs) -> Result<Self> {
        args.validate()?;

        let mut base = SourceBase::with_client(client);
        base.metadata
            .insert("database".to_string(), Value::from(args.database));
        if let Some(table) = &args.table {
            base.metadata
                .insert("table".to_string(), Value::from(table.to_string()));
        }

        Ok(TableSource { base, args })
    }

    pub fn args(&self) -> &TableArgs {
        &self.args
    }

    pub fn login_count(&self) -> usize {
        self.base.api().client().login_count()
    }

    fn label(&self) -> String {
        match (&self.args.table, &self.args.query) {
            (Some(table), _) => format!("table {} in database {}", table, self.args.database),
            (None, Some(_)) => format!("native query on database {}", self.args.database),
            (None, None) => format!("database {}", self.args.database),
        }
    }
}

impl DataSource for TableSource {
    fn driver(&self) -> &'static str {
        "metabase_table"
    }

    fn is_loaded(&self) -> bool {
        self.base.is_loaded()
    }

    fn schema(&mut self) -> Result<SourceSchema> {
        let label = self.label();
        let args = &self.args;
        self.base.schema_with(&label, |api| {
            api.fetch_table(args.database, args.table.as_ref(), args.query.as_deref())
        })
    }

    fn read(&mut self) -> Result<&DataFrame> {
        let label = self.label();
        let args = &self.args;
        self.base.load_with(&label, |api| {
            api.fetch_table(args.database, args.table.as_ref(), args.query.as_deref())
        })
    }

    fn close(&mut self) {
        self.base.close();
    }
}
