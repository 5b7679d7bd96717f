//! Connection configuration for a Metabase server
//!
//! Configuration is always passed explicitly to the client and the sources built
//! from it; nothing is read from ambient state after construction. The only
//! place environment variables are consulted is `MetabaseConfig::from_env`.

use crate::metabase::error::{MetabaseError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable names read by `MetabaseConfig::from_env`
pub const ENV_DOMAIN: &str = "METABASE_DOMAIN";
pub const ENV_USERNAME: &str = "METABASE_USERNAME";
pub const ENV_PASSWORD: &str = "METABASE_PASSWORD";
pub const ENV_TOKEN: &str = "METABASE_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "METABASE_TIMEOUT_SECS";

/// How the client authenticates
///
/// Username/password logins are refreshed by the client; a pre-issued token
/// is used as-is and never refreshed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    Password { username: String, password: String },
    Token { token: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Token { token } => f
                .debug_struct("Token")
                .field("token", &redact(token))
                .finish(),
        }
    }
}

/// Show the first characters of a secret only
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() > 4 {
        format!("{}***", prefix)
    } else {
        "***".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetabaseConfig {
    /// Server root, e.g. `https://metabase.example.com`
    pub domain: String,

    #[serde(flatten)]
    pub credentials: Credentials,

    /// Request timeout in seconds; `None` keeps the transport default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl MetabaseConfig {
    pub fn with_password(
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            credentials: Credentials::Password {
                username: username.into(),
                password: password.into(),
            },
            timeout_secs: None,
        }
    }

    pub fn with_token(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            credentials: Credentials::Token {
                token: token.into(),
            },
            timeout_secs: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Create a config from environment variables
    ///
    /// Required environment variables:
    /// - `METABASE_DOMAIN`: the server root URL
    /// - either `METABASE_TOKEN`, or `METABASE_USERNAME` and `METABASE_PASSWORD`
    ///
    /// When a token and a password are both present the token wins.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let domain = non_empty(ENV_DOMAIN).ok_or_else(|| {
            MetabaseError::Config(format!("{} environment variable not set", ENV_DOMAIN))
        })?;

        let credentials = match (
            non_empty(ENV_TOKEN),
            non_empty(ENV_USERNAME),
            non_empty(ENV_PASSWORD),
        ) {
            (Some(token), _, _) => Credentials::Token { token },
            (None, Some(username), Some(password)) => Credentials::Password { username, password },
            _ => {
                return Err(MetabaseError::Config(format!(
                    "set {} or both {} and {}",
                    ENV_TOKEN, ENV_USERNAME, ENV_PASSWORD
                )))
            }
        };

        let timeout_secs = match non_empty(ENV_TIMEOUT_SECS) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
                MetabaseError::Config(format!("Invalid {} '{}': {}", ENV_TIMEOUT_SECS, raw, e))
            })?),
            None => None,
        };

        let config = Self {
            domain,
            credentials,
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the domain parses as an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        self.base_url().map(|_| ())
    }

    /// Parsed server root
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.domain).map_err(|e| {
            MetabaseError::Config(format!("Invalid domain '{}': {}", self.domain, e))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(MetabaseError::Config(format!(
                "Unsupported scheme '{}' in domain '{}'",
                other, self.domain
            ))),
        }
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_password() {
        let config = MetabaseConfig::from_lookup(lookup_from(&[
            (ENV_DOMAIN, "http://localhost:3000"),
            (ENV_USERNAME, "ada"),
            (ENV_PASSWORD, "secret"),
        ]))
        .unwrap();

        assert_eq!(
            config.credentials,
            Credentials::Password {
                username: "ada".into(),
                password: "secret".into()
            }
        );
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn test_from_lookup_token_wins() {
        let config = MetabaseConfig::from_lookup(lookup_from(&[
            (ENV_DOMAIN, "http://localhost:3000"),
            (ENV_USERNAME, "ada"),
            (ENV_PASSWORD, "secret"),
            (ENV_TOKEN, "abcd-1234"),
            (ENV_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();

        assert_eq!(
            config.credentials,
            Credentials::Token {
                token: "abcd-1234".into()
            }
        );
        assert_eq!(config.timeout_duration(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_lookup_missing_credentials() {
        let err = MetabaseConfig::from_lookup(lookup_from(&[
            (ENV_DOMAIN, "http://localhost:3000"),
            (ENV_USERNAME, "ada"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MetabaseError::Config(_)));
    }

    #[test]
    fn test_from_lookup_missing_domain() {
        let err = MetabaseConfig::from_lookup(lookup_from(&[(ENV_TOKEN, "t")])).unwrap_err();
        assert!(err.to_string().contains(ENV_DOMAIN));
    }

    #[test]
    fn test_validate_rejects_bad_domains() {
        assert!(MetabaseConfig::with_token("not a url", "t").validate().is_err());
        assert!(MetabaseConfig::with_token("ftp://host", "t").validate().is_err());
        assert!(MetabaseConfig::with_token("https://host", "t").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = MetabaseConfig::with_password("http://h", "ada", "hunter2");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));

        let config = MetabaseConfig::with_token("http://h", "abcdef123456");
        let printed = format!("{:?}", config);
        assert!(printed.contains("abcd***"));
        assert!(!printed.contains("abcdef123456"));
    }

    #[test]
    fn test_serde_roundtrip_shapes() {
        let json = serde_json::json!({
            "domain": "http://h",
            "username": "ada",
            "password": "pw"
        });
        let config: MetabaseConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(config.credentials, Credentials::Password { .. }));

        let json = serde_json::json!({ "domain": "http://h", "token": "t" });
        let config: MetabaseConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(config.credentials, Credentials::Token { .. }));
    }
}
