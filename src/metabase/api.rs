use super::client::SessionClient;
use super::csv_convert::csv_to_dataframe;
use super::error::{MetabaseError, Result};
use super::query::{DatasetQuery, QueryTarget};
use super::types::{
    date_field_names, Database, DatabaseListing, DatasetResponse, FieldNaming, TableId,
    TableMetadata,
};
use polars::prelude::DataFrame;
use tracing::{debug, info, warn};

/// Metabase REST operations used by the catalog and its sources
///
/// Every call runs on the calling thread and blocks until the exchange is
/// complete. Nothing is retried and nothing is cached here; sources keep the
/// fetched tables.
pub struct MetabaseApi {
    client: SessionClient,
}

impl MetabaseApi {
    pub fn new(client: SessionClient) -> Self {
        MetabaseApi { client }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut SessionClient {
        &mut self.client
    }

    /// All databases with their tables, saved-question pseudo-database included
    pub fn list_databases(&mut self) -> Result<Vec<Database>> {
        let listing: DatabaseListing = self
            .client
            .get_json("/api/database", &[("include", "tables"), ("saved", "true")])?;
        let databases = listing.into_databases();
        debug!("Server reported {} databases", databases.len());
        Ok(databases)
    }

    /// Field metadata of a table or of a saved question's `card__<id>` table
    pub fn get_metadata(&mut self, table: &TableId) -> Result<TableMetadata> {
        self.client
            .get_json(&format!("/api/table/{}/query_metadata", table), &[])
    }

    /// Fetch a table, or the result of a native query, as a DataFrame
    ///
    /// Exactly one of `table` or `query` may be given; both is rejected before
    /// any request is sent. With neither, an unfiltered structured query is
    /// sent against the database and no columns are date-typed.
    ///
    /// A native `query` is executed twice: once through `/api/dataset`,
    /// limited to one row, to learn which result columns are dates, then again
    /// for the CSV export. Do not pass statements with side effects.
    pub fn fetch_table(
        &mut self,
        database: i64,
        table: Option<&TableId>,
        query: Option<&str>,
    ) -> Result<DataFrame> {
        let target = match (table, query) {
            (Some(_), Some(_)) => {
                return Err(MetabaseError::ConflictingParameters(
                    "table and query are mutually exclusive".to_string(),
                ))
            }
            (Some(table), None) => QueryTarget::Table(table.clone()),
            (None, Some(query)) => QueryTarget::Native(query.to_string()),
            (None, None) => {
                warn!(
                    "Neither table nor query given for database {}, sending unfiltered query",
                    database
                );
                QueryTarget::Unfiltered
            }
        };

        let date_fields = match &target {
            QueryTarget::Table(table) => {
                let metadata = self.get_metadata(table)?;
                date_field_names(&metadata.fields, FieldNaming::Display)
            }
            QueryTarget::Native(_) => self.native_date_fields(database, &target)?,
            QueryTarget::Unfiltered => Vec::new(),
        };
        debug!("Date fields: {:?}", date_fields);

        let body = serde_json::to_string(&DatasetQuery::new(database, &target))?;
        let csv = self
            .client
            .post_text("/api/dataset/csv", &[("query", body.as_str())])?;

        let df = csv_to_dataframe(&csv, &date_fields)?;
        info!(
            "Fetched {:?} from database {}: {} rows x {} columns",
            target,
            database,
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Fetch the result of a saved question as a DataFrame
    pub fn fetch_question(&mut self, question: i64) -> Result<DataFrame> {
        let metadata = self.get_metadata(&TableId::card(question))?;
        let date_fields = date_field_names(&metadata.fields, FieldNaming::Display);

        let csv = self
            .client
            .post_text(&format!("/api/card/{}/query/csv", question), &[])?;

        let df = csv_to_dataframe(&csv, &date_fields)?;
        info!(
            "Fetched question {}: {} rows x {} columns",
            question,
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Internal names of the date-typed result columns of a native query
    ///
    /// Runs the query once through `/api/dataset`, limited to a single row.
    fn native_date_fields(&mut self, database: i64, target: &QueryTarget) -> Result<Vec<String>> {
        let body = DatasetQuery::new(database, target).probe();
        let response: DatasetResponse = self.client.post_json("/api/dataset", &body)?;

        Ok(date_field_names(&response.data.cols, FieldNaming::Internal))
    }
}
