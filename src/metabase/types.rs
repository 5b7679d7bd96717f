//! Wire types for the Metabase REST API
//!
//! Only the fields this crate reads are modelled; everything else in the
//! server's payloads is ignored by serde.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Prefix Metabase uses for the synthetic tables backing saved questions
pub const CARD_PREFIX: &str = "card__";

/// Table identifier as reported by `/api/database`
///
/// Physical tables carry an integer id; saved questions show up as synthetic
/// tables whose id is the string `card__<question_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableId {
    Id(i64),
    Ref(String),
}

impl TableId {
    /// Reference to the synthetic table of a saved question
    pub fn card(question_id: i64) -> Self {
        TableId::Ref(format!("{}{}", CARD_PREFIX, question_id))
    }

    /// Question id embedded in a `card__<id>` reference
    ///
    /// Takes the suffix after the last `__`, so `card__42` yields `42`.
    pub fn question_id(&self) -> Option<&str> {
        match self {
            TableId::Id(_) => None,
            TableId::Ref(r) => r.rsplit_once("__").map(|(_, id)| id),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableId::Id(id) => write!(f, "{}", id),
            TableId::Ref(r) => f.write_str(r),
        }
    }
}

impl From<i64> for TableId {
    fn from(id: i64) -> Self {
        TableId::Id(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub display_name: String,

    /// Internal (column) name
    pub name: String,

    /// Dotted type tag such as `type/Date` or `type/Text`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub base_type: String,
}

impl Field {
    /// True when the type tag mentions "date" in any case
    pub fn is_date(&self) -> bool {
        self.base_type.to_lowercase().contains("date")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: i64,
    pub name: String,

    /// Set on the pseudo-database that lists saved questions
    #[serde(default)]
    pub is_saved_questions: bool,

    #[serde(default)]
    pub tables: Vec<Table>,
}

/// `/api/database` answers either `{data: [...]}` or a bare array depending
/// on the server version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum DatabaseListing {
    Wrapped { data: Vec<Database> },
    Bare(Vec<Database>),
}

impl DatabaseListing {
    pub(crate) fn into_databases(self) -> Vec<Database> {
        match self {
            DatabaseListing::Wrapped { data } => data,
            DatabaseListing::Bare(data) => data,
        }
    }
}

/// Response of `/api/table/<id>/query_metadata`
#[derive(Debug, Clone, Deserialize)]
pub struct TableMetadata {
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Response of `/api/session`
#[derive(Debug, Deserialize)]
pub(crate) struct SessionResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DatasetData {
    #[serde(default)]
    pub cols: Vec<Field>,
}

/// Response of `/api/dataset`
#[derive(Debug, Deserialize)]
pub(crate) struct DatasetResponse {
    pub data: DatasetData,
}

/// Which of a field's names the CSV header uses
///
/// Structured (table) exports label columns with display names, native query
/// exports with internal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNaming {
    Display,
    Internal,
}

/// Names of the date-typed fields, in the given naming convention
pub fn date_field_names(fields: &[Field], naming: FieldNaming) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.is_date())
        .map(|f| match naming {
            FieldNaming::Display => f.display_name.clone(),
            FieldNaming::Internal => f.name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(display: &str, name: &str, base_type: &str) -> Field {
        Field {
            display_name: display.to_string(),
            name: name.to_string(),
            base_type: base_type.to_string(),
        }
    }

    #[test]
    fn test_is_date() {
        assert!(field("Created", "created_at", "type/Date").is_date());
        assert!(field("Created", "created_at", "type/DateTimeWithLocalTZ").is_date());
        assert!(field("Updated", "updated_at", "TYPE/DATETIME").is_date());
        assert!(!field("Name", "name", "type/Text").is_date());
        assert!(!field("Unknown", "unknown", "").is_date());
    }

    #[test]
    fn test_date_field_names_naming() {
        let fields = vec![
            field("ID", "id", "type/BigInteger"),
            field("Created At", "created_at", "type/Date"),
        ];
        assert_eq!(
            date_field_names(&fields, FieldNaming::Display),
            vec!["Created At".to_string()]
        );
        assert_eq!(
            date_field_names(&fields, FieldNaming::Internal),
            vec!["created_at".to_string()]
        );
    }

    #[test]
    fn test_dataset_cols_use_internal_names() {
        let response: DatasetResponse = serde_json::from_value(serde_json::json!({
            "data": {"cols": [
                {"name": "ID", "base_type": "type/Integer"},
                {"name": "CREATED_AT", "display_name": "Created At", "base_type": "type/DateTime"},
                {"name": "NOTE", "base_type": null}
            ]}
        }))
        .unwrap();

        assert_eq!(
            date_field_names(&response.data.cols, FieldNaming::Internal),
            vec!["CREATED_AT".to_string()]
        );
    }

    #[test]
    fn test_table_id_question_id() {
        assert_eq!(TableId::Ref("card__42".into()).question_id(), Some("42"));
        assert_eq!(TableId::Ref("card__x__7".into()).question_id(), Some("7"));
        assert_eq!(TableId::Ref("orders".into()).question_id(), None);
        assert_eq!(TableId::Id(3).question_id(), None);
        assert_eq!(TableId::card(5).to_string(), "card__5");
    }

    #[test]
    fn test_database_listing_shapes() {
        let wrapped = serde_json::json!({
            "data": [{"id": 1, "name": "Sample", "tables": [
                {"id": 7, "name": "ORDERS", "description": null}
            ]}]
        });
        let listing: DatabaseListing = serde_json::from_value(wrapped).unwrap();
        let dbs = listing.into_databases();
        assert_eq!(dbs.len(), 1);
        assert_eq!(dbs[0].tables[0].id, TableId::Id(7));
        assert!(!dbs[0].is_saved_questions);

        let bare = serde_json::json!([{
            "id": -1337, "name": "Saved Questions", "is_saved_questions": true,
            "tables": [{"id": "card__3", "name": "Revenue"}]
        }]);
        let listing: DatabaseListing = serde_json::from_value(bare).unwrap();
        let dbs = listing.into_databases();
        assert!(dbs[0].is_saved_questions);
        assert_eq!(dbs[0].tables[0].id, TableId::card(3));
    }
}
