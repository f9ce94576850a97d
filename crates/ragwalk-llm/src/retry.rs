use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    if let Some(val) = response.headers().get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    backoff(attempt)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(MAX_BACKOFF_SHIFT))
}

/// Send an HTTP request, retrying up to `max_retries` times on 429 and 5xx responses.
///
/// Returns the first response that is neither rate limited nor a server error, so the
/// caller can inspect other failure statuses itself.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` if every attempt was rate limited, the last server
/// error as `LlmError::Other`, or the transport error as `LlmError::Http`.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=max_retries {
        let response = f().await.map_err(LlmError::Http)?;
        let status = response.status();

        let retryable =
            status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if !retryable {
            return Ok(response);
        }

        if attempt == max_retries {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited);
            }
            return Err(LlmError::Other(format!(
                "{provider_name} request failed after {} attempt(s) (status {status})",
                attempt + 1
            )));
        }

        let delay = retry_delay(&response, attempt);
        tracing::warn!(
            provider = provider_name,
            %status,
            attempt = attempt + 1,
            max_retries,
            delay_secs = delay.as_secs(),
            "retrying request"
        );
        tokio::time::sleep(delay).await;
    }

    Err(LlmError::RateLimited)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn rate_limited() -> ResponseTemplate {
        ResponseTemplate::new(429).insert_header("retry-after", "0")
    }

    async fn call(server: &MockServer, max_retries: u32) -> Result<reqwest::Response, LlmError> {
        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());
        send_with_retry("test", max_retries, || client.get(&url).send()).await
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(40), backoff(MAX_BACKOFF_SHIFT));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let response = call(&server, 3).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn exhausted_retries_return_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(rate_limited())
            .expect(2)
            .mount(&server)
            .await;

        let result = call(&server, 1).await;
        assert!(
            matches!(result, Err(LlmError::RateLimited)),
            "expected RateLimited, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn succeeds_after_one_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(rate_limited())
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = call(&server, 2).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn zero_retries_makes_a_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(rate_limited())
            .expect(1)
            .mount(&server)
            .await;

        assert!(call(&server, 0).await.is_err());
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let response = call(&server, 3).await.unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn server_error_after_retries_is_other() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let result = call(&server, 1).await;
        assert!(matches!(result, Err(LlmError::Other(ref m)) if m.contains("503")));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_never_below_base(attempt in 0u32..1000) {
            prop_assert!(backoff(attempt).as_secs() >= BASE_BACKOFF_SECS);
        }
    }
}
