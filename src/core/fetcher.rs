use std::time::Duration;

use tracing::{debug, warn};

use crate::core::dates::{format_date, DateRange};
use crate::core::error::{Result, UsageError};
use crate::core::models::usage::{DayUsage, UsageEntry, UsageResponse};

/// Added to the steady-state delay on every 429.
pub const RATE_LIMIT_STEP: Duration = Duration::from_millis(500);

const MAX_ERROR_BODY: usize = 200;

/// Throttle state threaded through the whole run. Only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Sleep after each successful request
    pub delay: Duration,
    /// 429 responses seen so far in this run
    pub rate_limit_hits: u32,
}

impl Backoff {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            rate_limit_hits: 0,
        }
    }

    fn escalate(&mut self) {
        self.delay += RATE_LIMIT_STEP;
        self.rate_limit_hits += 1;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub rate_limit_wait: Duration,
    /// Retries per day after a 429. 0 retries forever.
    pub max_retries: u32,
}

#[derive(Debug)]
pub enum DayResponse {
    RateLimited,
    Entries(Vec<UsageEntry>),
}

/// Something that can answer "what was the usage on this day".
#[allow(async_fn_in_trait)]
pub trait UsageSource {
    async fn get_day(&self, label: &str) -> Result<DayResponse>;
}

/// Validate that an endpoint URL uses HTTPS before credentials are sent to it.
///
/// Plain HTTP is allowed for loopback hosts only.
pub fn validate_endpoint(url: &str) -> Result<()> {
    if url.starts_with("https://") {
        return Ok(());
    }
    let loopback = ["http://127.0.0.1", "http://localhost", "http://[::1]"];
    let is_loopback = loopback.iter().any(|prefix| {
        url.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':') || rest.starts_with('/'))
    });
    if is_loopback {
        Ok(())
    } else {
        Err(UsageError::InsecureEndpoint(url.to_string()))
    }
}

pub struct HttpUsageSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
    org: String,
}

impl HttpUsageSource {
    pub fn new(api_base: &str, api_key: String, org: String, timeout: Duration) -> Result<Self> {
        validate_endpoint(api_base)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/usage", api_base.trim_end_matches('/')),
            api_key,
            org,
        })
    }
}

impl UsageSource for HttpUsageSource {
    async fn get_day(&self, label: &str) -> Result<DayResponse> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("date", label)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Openai-Organization", &self.org)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(DayResponse::RateLimited);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(UsageError::Status {
                date: label.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: UsageResponse =
            serde_json::from_str(&body).map_err(|source| UsageError::Decode {
                date: label.to_string(),
                source,
            })?;
        Ok(DayResponse::Entries(parsed.data))
    }
}

/// Fetch one day, retrying on 429.
///
/// Each 429 adds [`RATE_LIMIT_STEP`] to `backoff.delay` and waits
/// `policy.rate_limit_wait` before asking for the same day again. A
/// successful answer is followed by a `backoff.delay` sleep.
pub async fn fetch_day<S: UsageSource>(
    source: &S,
    label: &str,
    mut backoff: Backoff,
    policy: &RetryPolicy,
) -> Result<(Vec<UsageEntry>, Backoff)> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match source.get_day(label).await? {
            DayResponse::RateLimited => {
                backoff.escalate();
                if policy.max_retries > 0 && attempts > policy.max_retries {
                    return Err(UsageError::RateLimitExhausted {
                        date: label.to_string(),
                        attempts,
                    });
                }
                warn!(
                    "Rate limited for {}. Waiting {:.1}s, regular wait now {:.1}s",
                    label,
                    policy.rate_limit_wait.as_secs_f64(),
                    backoff.delay.as_secs_f64()
                );
                tokio::time::sleep(policy.rate_limit_wait).await;
            }
            DayResponse::Entries(entries) => {
                debug!("{}: {} entries after {} attempt(s)", label, entries.len(), attempts);
                tokio::time::sleep(backoff.delay).await;
                return Ok((entries, backoff));
            }
        }
    }
}

/// Fetch every day in `range` in order, threading the backoff through.
///
/// `on_day` is called before each request with the 1-based position and
/// the day label.
pub async fn fetch_range<S: UsageSource>(
    source: &S,
    range: &DateRange,
    encoding: &str,
    mut backoff: Backoff,
    policy: &RetryPolicy,
    mut on_day: impl FnMut(usize, &str),
) -> Result<(Vec<DayUsage>, Backoff)> {
    let mut days = Vec::with_capacity(range.len());
    for (i, date) in range.iter().enumerate() {
        let label = format_date(date, encoding)?;
        on_day(i + 1, &label);
        let (entries, next) = fetch_day(source, &label, backoff, policy).await?;
        backoff = next;
        days.push(DayUsage { label, entries });
    }
    Ok((days, backoff))
}
