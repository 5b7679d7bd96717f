//! SourceBase - shared state of every DataSource
//!
//! Both TableSource and QuestionSource wrap this struct. It owns the session
//! used for fetching and the cached DataFrame.

use super::SourceSchema;
use crate::metabase::error::Result;
use crate::metabase::{MetabaseApi, SessionClient};
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use tracing::debug;

pub struct SourceBase {
    pub(super) api: MetabaseApi,

    /// Fetched table; `None` until the first successful load
    pub(super) dataframe: Option<DataFrame>,

    pub(super) metadata: Map<String, Value>,
}

impl SourceBase {
    pub fn with_client(client: SessionClient) -> Self {
        SourceBase {
            api: MetabaseApi::new(client),
            dataframe: None,
            metadata: Map::new(),
        }
    }

    /// Return the cached table, running `fetch` first if nothing is cached
    ///
    /// Check-then-populate without locking: callers hold `&mut self`.
    pub fn load_with<F>(&mut self, label: &str, fetch: F) -> Result<&DataFrame>
    where
        F: FnOnce(&mut MetabaseApi) -> Result<DataFrame>,
    {
        let df = match self.dataframe.take() {
            Some(df) => {
                debug!("DataFrame cache HIT for {}", label);
                df
            }
            None => {
                debug!("DataFrame cache MISS for {} - fetching", label);
                fetch(&mut self.api)?
            }
        };
        Ok(self.dataframe.insert(df))
    }

    pub fn schema_with<F>(&mut self, label: &str, fetch: F) -> Result<SourceSchema>
    where
        F: FnOnce(&mut MetabaseApi) -> Result<DataFrame>,
    {
        let metadata = self.metadata.clone();
        let df = self.load_with(label, fetch)?;
        Ok(SourceSchema::from_dataframe(df, metadata))
    }

    pub fn is_loaded(&self) -> bool {
        self.dataframe.is_some()
    }

    pub fn close(&mut self) {
        self.dataframe = None;
    }

    pub fn api(&self) -> &MetabaseApi {
        &self.api
    }
}
