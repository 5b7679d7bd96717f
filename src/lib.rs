//! Metabase Catalog Library
//!
//! Exposes the tables and saved questions of a Metabase server as named,
//! lazily-loaded Polars DataFrames.
//!
//! Module organization:
//! - `metabase`: REST client, session handling and CSV conversion
//! - `source`: the `DataSource` trait and its table/question implementations
//! - `catalog`: enumeration of entries and the source factory
//! - `config`: connection configuration

pub mod catalog;
pub mod config;
pub mod metabase;
pub mod source;

pub use catalog::{CatalogEntry, MetabaseCatalog, SourceArgs};
pub use config::{Credentials, MetabaseConfig};
pub use metabase::{MetabaseError, Result};
pub use source::{DataSource, QuestionSource, SourceSchema, TableSource};
