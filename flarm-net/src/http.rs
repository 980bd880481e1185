// flarm-net/src/http.rs
use std::time::Duration;

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

const USER_AGENT_STRING: &str = "flarm package installer (Rust; +https://github.com/flarm/flarm)";
const MAX_REDIRECTS: usize = 10;

/// Blocking client shared by every request of one repository client.
///
/// Must be built and dropped outside of an async runtime.
pub(crate) fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| FlarmError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// Maps a transport failure onto the retryable variants.
pub(crate) fn map_request_error(err: reqwest::Error, url: &str, timeout: Duration) -> FlarmError {
    if err.is_timeout() {
        FlarmError::Timeout(format!("{url} did not answer within {}s", timeout.as_secs()))
    } else if err.is_connect() || err.is_request() {
        FlarmError::NetworkUnavailable(format!("Could not reach {url}: {err}"))
    } else {
        FlarmError::from(err)
    }
}

/// Turns a non-success status into an error.
pub(crate) fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if status.is_success() {
        return Ok(response);
    }
    Err(status_error(status, url))
}

pub(crate) fn status_error(status: StatusCode, url: &str) -> FlarmError {
    match status {
        StatusCode::NOT_FOUND => FlarmError::NotFound(format!("{url} (404)")),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            FlarmError::Timeout(format!("{url} answered {status}"))
        }
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            FlarmError::NetworkUnavailable(format!("{url} answered {status}"))
        }
        _ => FlarmError::Generic(format!("HTTP error {status} for URL {url}")),
    }
}
