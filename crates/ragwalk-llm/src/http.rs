//! Shared HTTP client construction for consistent timeout configuration.

use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Create an HTTP client with the standard ragwalk configuration.
///
/// Config: 30s connect timeout, `timeout` request timeout, rustls TLS,
/// `ragwalk/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .user_agent(concat!("ragwalk/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// Client with a 60s request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    client_with_timeout(Duration::from_secs(60))
}
