//! Dataset query bodies sent to `/api/dataset` and `/api/dataset/csv`

use super::types::TableId;
use serde::Serialize;

/// What a dataset request selects
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    /// Structured query over one table
    Table(TableId),
    /// Native query text, passed through untouched
    Native(String),
    /// Structured query with no source table
    Unfiltered,
}

#[derive(Debug, Clone, Serialize)]
struct Middleware {
    #[serde(rename = "js-int-to-string?")]
    js_int_to_string: bool,
    #[serde(rename = "add-default-userland-constraints?")]
    add_default_userland_constraints: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Constraints {
    #[serde(rename = "max-results")]
    max_results: u32,
    #[serde(rename = "max-results-bare-rows")]
    max_results_bare_rows: u32,
}

#[derive(Debug, Clone, Serialize)]
struct StructuredQuery {
    #[serde(rename = "source-table", skip_serializing_if = "Option::is_none")]
    source_table: Option<TableId>,
}

#[derive(Debug, Clone, Serialize)]
struct NativeQuery {
    query: String,
}

/// JSON body of a dataset request
#[derive(Debug, Clone, Serialize)]
pub struct DatasetQuery {
    database: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<StructuredQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    native: Option<NativeQuery>,
    middleware: Middleware,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<Constraints>,
}

impl DatasetQuery {
    pub fn new(database: i64, target: &QueryTarget) -> Self {
        let (kind, query, native) = match target {
            QueryTarget::Table(table) => (
                "query",
                Some(StructuredQuery {
                    source_table: Some(table.clone()),
                }),
                None,
            ),
            QueryTarget::Native(text) => (
                "native",
                None,
                Some(NativeQuery {
                    query: text.clone(),
                }),
            ),
            QueryTarget::Unfiltered => (
                "query",
                Some(StructuredQuery { source_table: None }),
                None,
            ),
        };

        DatasetQuery {
            database,
            kind,
            query,
            native,
            middleware: Middleware {
                js_int_to_string: true,
                add_default_userland_constraints: true,
            },
            constraints: None,
        }
    }

    /// Limit the result to a single row; used to probe column metadata
    pub fn probe(mut self) -> Self {
        self.constraints = Some(Constraints {
            max_results: 1,
            max_results_bare_rows: 1,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_query_body() {
        let body = serde_json::to_value(DatasetQuery::new(2, &QueryTarget::Table(TableId::Id(7))))
            .unwrap();
        assert_eq!(body["database"], json!(2));
        assert_eq!(body["type"], json!("query"));
        assert_eq!(body["query"], json!({"source-table": 7}));
        assert!(body.get("native").is_none());
        assert_eq!(body["middleware"]["js-int-to-string?"], json!(true));
    }

    #[test]
    fn test_native_query_body() {
        let target = QueryTarget::Native("select 1".to_string());
        let body = serde_json::to_value(DatasetQuery::new(2, &target).probe()).unwrap();
        assert_eq!(body["type"], json!("native"));
        assert_eq!(body["native"], json!({"query": "select 1"}));
        assert!(body.get("query").is_none());
        assert_eq!(body["constraints"]["max-results"], json!(1));
    }

    #[test]
    fn test_unfiltered_query_body() {
        let body = serde_json::to_value(DatasetQuery::new(2, &QueryTarget::Unfiltered)).unwrap();
        assert_eq!(body["query"], json!({}));
        assert!(body.get("constraints").is_none());
    }
}
