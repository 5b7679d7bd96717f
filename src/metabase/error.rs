use thiserror::Error;

/// Errors that can occur when talking to a Metabase server
#[derive(Debug, Error)]
pub enum MetabaseError {
    /// Login against `/api/session` failed
    ///
    /// `status` is `None` when the server could not be reached at all.
    #[error("Authentication error ({}): {body}", format_status(.status))]
    Authentication { status: Option<u16>, body: String },

    /// Any other non-2xx response (metadata, listing, export)
    #[error("Remote request to {url} failed ({status}): {body}")]
    RemoteRequest {
        status: u16,
        url: String,
        body: String,
    },

    /// Both a table identifier and a raw query were supplied
    #[error("Conflicting parameters: {0}")]
    ConflictingParameters(String),

    /// Multi-partition access was requested
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No catalog entry with the requested name
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Configuration error (missing env vars, invalid URLs, missing credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error outside of login
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered 2xx but the payload had an unexpected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// CSV parsing or dataframe construction failed
    #[error("CSV error: {0}")]
    Csv(#[from] polars::prelude::PolarsError),

    /// JSON encoding of a query body failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_status(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unreachable".to_string())
}

impl MetabaseError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            MetabaseError::Authentication { status, .. } => *status,
            MetabaseError::RemoteRequest { status, .. } => Some(*status),
            MetabaseError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for errors raised before any request was sent
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MetabaseError::ConflictingParameters(_) | MetabaseError::Config(_)
        )
    }
}

/// Type alias for Results using MetabaseError
pub type Result<T> = std::result::Result<T, MetabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_display_without_status() {
        let err = MetabaseError::Authentication {
            status: None,
            body: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication error (unreachable): connection refused"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_remote_request_status() {
        let err = MetabaseError::RemoteRequest {
            status: 404,
            url: "http://localhost/api/table/9/query_metadata".to_string(),
            body: "Not found.".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(MetabaseError::ConflictingParameters("x".into()).is_configuration());
        assert!(MetabaseError::Config("x".into()).is_configuration());
        assert!(!MetabaseError::UnsupportedOperation("x".into()).is_configuration());
    }
}
