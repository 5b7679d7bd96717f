use super::error::{MetabaseError, Result};
use super::types::SessionResponse;
use crate::config::{redact, Credentials, MetabaseConfig};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
#[cfg(test)]
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Header carrying the session token on every authenticated request
pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// How long a token obtained from `/api/session` is trusted
pub const TOKEN_RETENTION_DAYS: i64 = 10;

/// Source of the current time for token expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same instant, so a test can keep one handle and give the
/// other to a client.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Authenticated HTTP session against a Metabase server
///
/// Holds exactly one token. Logins happen lazily on the first authenticated
/// call and again once the token is past its retention window. A token
/// supplied up front is never refreshed; if the server rejects it the next
/// request fails with `MetabaseError::RemoteRequest`.
///
/// Refreshing mutates the client, so a client must not be shared between
/// threads without external locking. Give each source its own client.
pub struct SessionClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
    token: Option<String>,
    token_expiration: Option<DateTime<Utc>>,
    clock: Box<dyn Clock>,
    login_count: usize,
}

impl SessionClient {
    /// Create a client for the configured server
    ///
    /// No request is sent; password logins happen on first use.
    pub fn new(config: &MetabaseConfig) -> Result<Self> {
        let base_url = config.base_url()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_duration() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let token = match &config.credentials {
            Credentials::Token { token } => Some(token.clone()),
            Credentials::Password { .. } => None,
        };

        Ok(SessionClient {
            http,
            base_url,
            credentials: config.credentials.clone(),
            token,
            token_expiration: None,
            clock: Box::new(SystemClock),
            login_count: 0,
        })
    }

    /// Replace the clock used for expiry checks
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of logins performed so far
    pub fn login_count(&self) -> usize {
        self.login_count
    }

    pub fn token_expiration(&self) -> Option<DateTime<Utc>> {
        self.token_expiration
    }

    /// Make sure a usable token is held, logging in if needed
    ///
    /// Returns without any network call when a token is present and either
    /// has no expiry (pre-supplied) or has not expired yet.
    pub fn ensure_valid_token(&mut self) -> Result<()> {
        if self.token.is_some() {
            match self.token_expiration {
                None => return Ok(()),
                Some(expiration) if self.clock.now() < expiration => return Ok(()),
                Some(_) => debug!("Session token expired, logging in again"),
            }
        }

        let (username, password) = match &self.credentials {
            Credentials::Password { username, password } => (username.clone(), password.clone()),
            // Token credentials are installed at construction and never expire
            Credentials::Token { .. } => return Ok(()),
        };

        self.login(&username, &password)
    }

    fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = self.url("/api/session")?;
        info!("Logging in to {} as {}", self.base_url, username);

        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .map_err(|e| MetabaseError::Authentication {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MetabaseError::Authentication {
                status: Some(status.as_u16()),
                body,
            });
        }

        let session: SessionResponse = response.json().map_err(|e| {
            MetabaseError::InvalidResponse(format!("Failed to decode session response: {}", e))
        })?;

        debug!("Obtained session token {}", redact(&session.id));
        self.token = Some(session.id);
        self.token_expiration = Some(self.clock.now() + Duration::days(TOKEN_RETENTION_DAYS));
        self.login_count += 1;
        Ok(())
    }

    /// Resolve an absolute API path against the server root
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MetabaseError::Config(format!("Invalid API path '{}': {}", path, e)))
    }

    /// Authenticated GET decoding a JSON response
    pub fn get_json<T>(&mut self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = self.authenticated(reqwest::Method::GET, path)?.query(query);
        let response = send_checked(request)?;
        decode_json(response)
    }

    /// Authenticated POST of a JSON body decoding a JSON response
    pub fn post_json<B, T>(&mut self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authenticated(reqwest::Method::POST, path)?.json(body);
        let response = send_checked(request)?;
        decode_json(response)
    }

    /// Authenticated form POST returning the body as text
    ///
    /// The body is decoded with the charset declared by the response, falling
    /// back to UTF-8.
    pub fn post_text(&mut self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let request = self
            .authenticated(reqwest::Method::POST, path)?
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .query(query);
        let response = send_checked(request)?;
        Ok(response.text()?)
    }

    fn authenticated(&mut self, method: reqwest::Method, path: &str) -> Result<RequestBuilder> {
        self.ensure_valid_token()?;
        let url = self.url(path)?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| MetabaseError::Authentication {
                status: None,
                body: "no session token available".to_string(),
            })?;

        debug!("{} {}", method, url);
        Ok(self.http.request(method, url).header(SESSION_HEADER, token))
    }
}

/// Send a request, turning non-2xx answers into `RemoteRequest`
fn send_checked(request: RequestBuilder) -> Result<Response> {
    let response = request.send()?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    Err(MetabaseError::RemoteRequest {
        status: status.as_u16(),
        url,
        body,
    })
}

fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().to_string();
    let bytes = response.bytes()?;
    serde_json::from_slice(&bytes).map_err(|e| {
        MetabaseError::InvalidResponse(format!("Unexpected payload from {}: {}", url, e))
    })
}
