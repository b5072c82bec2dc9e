//! Shared JSON-over-HTTP plumbing for the external model services.
//!
//! Every provider posts a JSON body and reads a JSON response through
//! [`post_json`], which applies the same retry strategy:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 401/403 → fail immediately as an authentication failure
//! - Other HTTP 4xx → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: `backoff`, `2 × backoff`, `4 × backoff`, … (doubling capped at 2^5)

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

/// Connection settings for one external service, resolved from config.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub model: String,
    /// Credential sent with each request. Ollama needs none.
    pub api_key: Option<String>,
    /// Base URL without a trailing slash, e.g. `https://api.openai.com`.
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * (1u32 << (attempt - 1).min(5))
    }

    /// Longest a call can take when every attempt runs into
    /// `per_attempt`: all attempts plus every backoff sleep between them.
    pub fn call_budget(&self, per_attempt: Duration) -> Duration {
        let backoff: Duration = (1..=self.max_retries).map(|a| self.delay(a)).sum();
        per_attempt * (self.max_retries + 1) + backoff
    }
}

/// Why a call failed after all attempts. Providers translate this into
/// their own error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    Status { status: u16, body: String },
    Auth { status: u16, body: String },
    Timeout,
    Transport(String),
    Malformed(String),
}

pub(crate) fn build_client(settings: &ServiceSettings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(settings.timeout).build()
}

/// POST `body` to `url` with retry/backoff and return the parsed JSON reply.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    policy: RetryPolicy,
) -> Result<serde_json::Value, CallFailure> {
    let mut last_err = CallFailure::Transport("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            warn!(
                url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = ?last_err,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        debug!(url, attempt, "sending request");

        match req.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| CallFailure::Malformed(e.to_string()));
                }

                let body_text = response.text().await.unwrap_or_default();

                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_err = CallFailure::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };
                    continue;
                }

                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(CallFailure::Auth {
                        status: status.as_u16(),
                        body: body_text,
                    });
                }

                return Err(CallFailure::Status {
                    status: status.as_u16(),
                    body: body_text,
                });
            }
            Err(e) if e.is_timeout() => {
                last_err = CallFailure::Timeout;
            }
            Err(e) => {
                last_err = CallFailure::Transport(e.to_string());
            }
        }
    }

    Err(last_err)
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_budget_covers_every_attempt() {
        let p = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(100),
        };
        // 3 attempts of 1s, then sleeps of 100ms and 200ms.
        assert_eq!(p.call_budget(Duration::from_secs(1)), Duration::from_millis(3300));

        let none = RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(none.call_budget(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_retries: 10,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(4), Duration::from_millis(800));
        assert_eq!(p.delay(9), Duration::from_millis(3200));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://x/", "/v1/a"), "http://x/v1/a");
        assert_eq!(join_url("http://x", "v1/a"), "http://x/v1/a");
    }
}
