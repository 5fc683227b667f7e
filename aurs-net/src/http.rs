// aurs-net/src/http.rs
use std::thread;
use std::time::Duration;

use aurs_common::error::{AursError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT_STRING: &str = concat!("aurs/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// How often and how patiently transport failures are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "{what} failed (attempt {attempt}/{}): {e}; retrying",
                        self.max_attempts
                    );
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!("{what} failed after {attempt} attempt(s): {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| AursError::HttpError(format!("Failed to build HTTP client: {e}")))
}

/// One GET request decoded as JSON. Server errors and throttling come back
/// as retryable `HttpError`, other non-success statuses as `Api`.
pub fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    debug!("GET {} ({} query parameter(s))", url, query.len());
    let response = client.get(url).query(query).send().map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        AursError::HttpError(format!("HTTP request failed for {url}: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|e| format!("(Failed to read response body: {e})"));
        debug!("Response body for failed request to {}: {}", url, body);
        return Err(
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                AursError::HttpError(format!("HTTP error {status} for URL {url}"))
            } else {
                AursError::Api(format!("HTTP status {status} from {url}"))
            },
        );
    }

    let body = response
        .text()
        .map_err(|e| AursError::HttpError(format!("Failed to read response body: {e}")))?;
    if body.trim().is_empty() {
        error!("Response body for {} was empty.", url);
        return Err(AursError::HttpError(format!(
            "Empty response body received from {url}"
        )));
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn instant_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_retry_stops_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = instant_policy().run("probe", || {
            calls.set(calls.get() + 1);
            Err(AursError::HttpError("reset".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_non_retryable_errors_fail_fast() {
        let calls = Cell::new(0);
        let result: Result<()> = instant_policy().run("probe", || {
            calls.set(calls.get() + 1);
            Err(AursError::Api("bad request".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_returns_first_success() {
        let calls = Cell::new(0);
        let result = instant_policy().run("probe", || {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(AursError::HttpError("flaky".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 2);
    }
}
