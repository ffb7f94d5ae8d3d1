//! HTTP fetch with retry classification, capped exponential backoff, and a
//! pacer enforcing the minimum gap between successive requests even under
//! concurrency.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info_span;
use uuid::Uuid;

use crate::ScrapeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Serializes request start times: every caller waits until at least
/// `min_gap` after the previously scheduled request, regardless of how
/// many tasks are fetching concurrently.
#[derive(Debug)]
pub struct Pacer {
    min_gap: Duration,
    next_ready: Mutex<Instant>,
}

impl Pacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            next_ready: Mutex::new(Instant::now()),
        }
    }

    pub async fn pace(&self) {
        let wake = {
            let mut next = self.next_ready.lock().await;
            let now = Instant::now();
            let wake = if *next > now { *next } else { now };
            *next = wake + self.min_gap;
            wake
        };
        let now = Instant::now();
        if wake > now {
            tokio::time::sleep(wake - now).await;
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Report document fetcher. One instance per batch; owns the client, the
/// pacer, and the retry policy.
#[derive(Debug)]
pub struct ReportFetcher {
    client: reqwest::Client,
    pacer: Pacer,
    backoff: BackoffPolicy,
}

impl ReportFetcher {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            pacer: Pacer::new(config.min_delay),
            backoff: BackoffPolicy::default(),
        })
    }

    /// Fetch one report document body, retrying on retryable failures.
    /// The pacer gates every attempt, so retries also honor the minimum
    /// request gap.
    pub async fn fetch_report(
        &self,
        run_id: Uuid,
        project_id: &str,
        url: &str,
    ) -> Result<String, FetchError> {
        let span = info_span!("report_fetch", %run_id, project_id, url);
        let _guard = span.enter();

        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.backoff.max_retries {
            self.pacer.pace().await;

            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        return Ok(resp.text().await?);
                    }

                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        last_request_error = Some(err);
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        Err(FetchError::Request(
            last_request_error.expect("retry loop should capture a request error"),
        ))
    }
}
