//! Metabase REST client module
//!
//! Structure:
//! - `client.rs`: session handling and authenticated requests
//! - `api.rs`: listing, metadata and CSV export operations
//! - `query.rs`: dataset query bodies
//! - `csv_convert.rs`: CSV to DataFrame conversion with date typing
//! - `types.rs`: wire types
//! - `error.rs`: error types

pub mod error;

pub mod api;
pub mod client;
pub mod csv_convert;
pub mod query;
pub mod types;

// Re-exports for convenience
pub use api::MetabaseApi;
pub use client::{Clock, SessionClient, SystemClock};
#[cfg(test)]
pub use client::ManualClock;
pub use csv_convert::csv_to_dataframe;
pub use error::{MetabaseError, Result};
pub use types::{Database, Field, Table, TableId};
