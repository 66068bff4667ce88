//! Base document sources
//!
//! The pipeline only needs "give me the raw document text"; the
//! [`DocumentSource`] trait keeps the HTTP client out of its tests.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::{debug, info};

/// Accept header sent with every fetch.
pub const ACCEPT_TEXT: &str = "text/plain, */*";

/// Errors for document fetching
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetched document from {0} is empty")]
    Empty(String),
}

/// Something that yields the raw base document.
pub trait DocumentSource {
    /// Human-readable origin, used in logs and the output header.
    fn describe(&self) -> String;

    /// Retrieve the document text.
    fn fetch(&self) -> Result<String, FetchError>;
}

/// Blocking HTTP source with a fixed timeout.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn http_error(&self, source: reqwest::Error) -> FetchError {
        FetchError::Http {
            url: self.url.clone(),
            source,
        }
    }
}

impl DocumentSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<String, FetchError> {
        info!(url = %self.url, timeout_secs = self.timeout.as_secs(), "fetching base document");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| self.http_error(e))?;
        let resp = client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, ACCEPT_TEXT)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.http_error(e))?;
        let body = resp.text().map_err(|e| self.http_error(e))?;

        let body = non_empty(body, &self.url)?;
        info!(bytes = body.len(), "base document fetched");
        Ok(body)
    }
}

/// Local file source, for offline merges.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String, FetchError> {
        let body = fs::read_to_string(&self.path).map_err(|e| FetchError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        debug!(path = %self.path.display(), bytes = body.len(), "base document read");
        non_empty(body, &self.describe())
    }
}

fn non_empty(body: String, origin: &str) -> Result<String, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::Empty(origin.to_string()));
    }
    Ok(body)
}
