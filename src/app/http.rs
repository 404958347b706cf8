// src/app/http.rs — the one retry/backoff utility every network path
// goes through.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, not re-attempts.
    pub retries: u32,
    pub backoff: Duration,
    pub factor: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(1000),
            factor: 2,
            timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt after `attempt` (1-based):
    /// `backoff × factor^(attempt-1)`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * self.factor.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` up to `policy.retries` times, sleeping the exponential
/// backoff between attempts. Returns the last error once exhausted.
pub fn retry_with_backoff<T, F>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, String>
where
    F: FnMut(u32) -> Result<T, String>,
{
    let mut last_err = String::from("no attempts made");
    for attempt in 1..=policy.retries.max(1) {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                debug!(
                    "attempt {attempt}/{retries} failed for {what}: {e}",
                    retries = policy.retries
                );
                last_err = e;
                if attempt < policy.retries {
                    let wait = policy.backoff_for(attempt);
                    debug!("retrying {what} in {}ms", wait.as_millis());
                    std::thread::sleep(wait);
                }
            }
        }
    }
    Err(last_err)
}

/// Build the shared pooled client; worker threads hold clones.
pub fn build_client(user_agent: &str) -> Client {
    Client::builder()
        .user_agent(user_agent.to_string())
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|err| {
            warn!("pooled client build failed ({err}); using defaults");
            Client::new()
        })
}

/// GET `url` as text with retry/backoff. Non-2xx statuses and HTML
/// pages substituted for the expected text both count as failures.
pub fn fetch_text_with_retry(client: &Client, url: &str, policy: RetryPolicy) -> Result<String, String> {
    retry_with_backoff(policy, url, |_attempt| {
        let resp = client
            .get(url)
            .timeout(policy.timeout)
            .header(reqwest::header::ACCEPT, "text/csv, text/plain, */*")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|e| format!("GET {url}: {e}"))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| format!("read body: {e}"))?;
        if !status.is_success() {
            return Err(format!("HTTP {status} for {url}"));
        }
        if crate::app::csv::looks_like_html(&text) {
            return Err("received HTML instead of expected text response".into());
        }
        Ok(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            backoff: Duration::from_millis(10),
            factor: 2,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn backoff_schedule_is_exponential() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(p.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(p.backoff_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn succeeds_after_two_failures() {
        let mut attempts = 0u32;
        let started = Instant::now();
        let out = retry_with_backoff(quick_policy(), "test", |attempt| {
            attempts += 1;
            assert_eq!(attempt, attempts);
            if attempts < 3 {
                Err(format!("boom {attempts}"))
            } else {
                Ok("payload")
            }
        });
        assert_eq!(out, Ok("payload"));
        assert_eq!(attempts, 3);
        // Two waits: backoff + backoff×factor = 10ms + 20ms.
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let mut attempts = 0u32;
        let out: Result<(), String> = retry_with_backoff(quick_policy(), "test", |_| {
            attempts += 1;
            Err(format!("err {attempts}"))
        });
        assert_eq!(attempts, 3);
        assert_eq!(out, Err("err 3".to_string()));
    }

    #[test]
    fn first_success_skips_backoff() {
        let started = Instant::now();
        let out = retry_with_backoff(quick_policy(), "test", |_| Ok(1));
        assert_eq!(out, Ok(1));
        assert!(started.elapsed() < Duration::from_millis(10));
    }
}
