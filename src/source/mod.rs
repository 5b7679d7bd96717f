//! DataSource trait and implementations
//!
//! A source is one lazily-loaded Metabase dataset. It fetches its table on
//! first access and hands out the same in-memory DataFrame afterwards.
//!
//! Implementations:
//! - `TableSource`: a table by id, or the result of a native query
//! - `QuestionSource`: a saved question

use crate::metabase::error::{MetabaseError, Result};
use polars::prelude::{DataFrame, DataType};
use serde_json::{Map, Value};

mod base;
mod question_source;
mod table_source;

pub use question_source::{QuestionArgs, QuestionSource};
pub use table_source::{TableArgs, TableSource};

/// Shape and column types of a source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSchema {
    /// Row count; not reported, as the export is not paged
    pub rows: Option<usize>,

    pub columns: usize,

    /// Column names and types in frame order
    pub dtypes: Vec<(String, DataType)>,

    /// Always 1: the table is a single materialized partition
    pub npartitions: usize,

    pub extra_metadata: Map<String, Value>,
}

impl SourceSchema {
    pub fn from_dataframe(df: &DataFrame, extra_metadata: Map<String, Value>) -> Self {
        let dtypes: Vec<(String, DataType)> = df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().clone()))
            .collect();

        SourceSchema {
            rows: None,
            columns: dtypes.len(),
            dtypes,
            npartitions: 1,
            extra_metadata,
        }
    }
}

/// A named, lazily-loaded Metabase dataset
///
/// `read` fetches at most once per instance: the first successful fetch is
/// cached and returned on every later call until `close`. A failed fetch
/// caches nothing, so the next `read` sends the requests again.
///
/// Sources are not synchronized. Loading mutates the source through
/// `&mut self`, and each source owns its own session.
pub trait DataSource {
    /// Driver name, e.g. `metabase_table`
    fn driver(&self) -> &'static str;

    /// Whether the table has been fetched and is held in memory
    fn is_loaded(&self) -> bool;

    /// Fetch the table (once) and describe it
    fn schema(&mut self) -> Result<SourceSchema>;

    /// Fetch the table (once) and return it
    fn read(&mut self) -> Result<&DataFrame>;

    /// Drop the cached table
    fn close(&mut self);

    /// Return partition `index`; only partition 0 exists
    fn read_partition(&mut self, index: usize) -> Result<&DataFrame> {
        if index != 0 {
            return Err(MetabaseError::UnsupportedOperation(format!(
                "{} has a single partition, requested partition {}",
                self.driver(),
                index
            )));
        }
        self.read()
    }

    /// Split into multiple partitions; never supported
    fn to_partitioned(&mut self) -> Result<Vec<DataFrame>> {
        Err(MetabaseError::UnsupportedOperation(format!(
            "{} only returns a single, fully materialized partition",
            self.driver()
        )))
    }
}
