//! Metadata client: one lookup with throttling, deadline and retries.
//!
//! Every attempt (first try and retries alike) takes a slot from the shared
//! [`RateLimiter`] and runs under a hard timeout. Transient failures are
//! retried per the [`RetryPolicy`]; anything else is returned as-is.

use std::sync::Arc;
use std::time::Duration;

use super::domain::{LookupError, LookupHints, LookupOutcome};
use super::rate_limit::RateLimiter;
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use super::traits::MetadataSource;
use crate::config::Config;

pub struct MetadataClient {
    source: Arc<dyn MetadataSource>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    timeout: Duration,
    min_confidence: f32,
}

impl MetadataClient {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        timeout: Duration,
        min_confidence: f32,
    ) -> Self {
        tracing::debug!(
            interval_ms = limiter.interval().as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            max_attempts = policy.max_attempts,
            max_backoff_ms = policy.max_total_backoff().as_millis() as u64,
            "Metadata client ready"
        );
        Self {
            source,
            limiter,
            policy,
            timeout,
            min_confidence,
        }
    }

    /// Build a client with the lookup settings from `config`.
    pub fn from_config(source: Arc<dyn MetadataSource>, config: &Config) -> Self {
        Self::new(
            source,
            Arc::new(RateLimiter::new(config.lookup.rate_limit_interval())),
            config.lookup.retry_policy(),
            config.lookup.request_timeout(),
            config.enrichment.min_confidence,
        )
    }

    /// Look up one file.
    ///
    /// Returns `NotFound` without touching the network when the hints
    /// cannot form a query. An `Err` means the retries were exhausted or
    /// the service refused the request; the caller should try again on a
    /// later cycle.
    pub async fn lookup(&self, hints: &LookupHints) -> Result<LookupOutcome, LookupError> {
        if !hints.is_searchable() {
            tracing::debug!(path = %hints.path.display(), "Nothing to search with");
            return Ok(LookupOutcome::NotFound);
        }

        let mut retry = RetryState::new(self.policy);
        loop {
            self.limiter.acquire().await;

            let attempt = tokio::time::timeout(self.timeout, self.source.lookup(hints))
                .await
                .unwrap_or(Err(LookupError::Timeout));

            match attempt {
                Ok(LookupOutcome::Found(result)) if result.confidence < self.min_confidence => {
                    tracing::debug!(
                        path = %hints.path.display(),
                        confidence = result.confidence,
                        min = self.min_confidence,
                        "Match below confidence threshold"
                    );
                    return Ok(LookupOutcome::NotFound);
                }
                Ok(outcome) => return Ok(outcome),
                Err(error) => match retry.on_failure(&error) {
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(
                            path = %hints.path.display(),
                            attempt = retry.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            %error,
                            "Lookup failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::GiveUp => {
                        tracing::warn!(
                            path = %hints.path.display(),
                            attempts = retry.attempts(),
                            %error,
                            "Lookup failed"
                        );
                        return Err(error);
                    }
                },
            }
        }
    }
}
