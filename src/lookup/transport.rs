//! HTTP transport used by the lookup pool.
//!
//! The pool only needs "GET this URL with this timeout, give me status and
//! body", so that is the whole trait. [`HttpTransport`] implements it with a
//! blocking `reqwest` client.

use std::time::Duration;

use crate::error::LookupError;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpReply {
    /// Convenience constructor.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Blocking GET.
pub trait Transport {
    /// Fetch `url`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Transport`] for connection failures, timeouts
    /// and unreadable bodies. Non-2xx statuses are not errors here.
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, LookupError>;
}

/// [`Transport`] backed by `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client with the crate's user agent.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Transport`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("netvendor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, LookupError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}
