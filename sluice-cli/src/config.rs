//! Configuration module
//!
//! Handles CLI configuration: the service endpoint, HTTP timeouts and the
//! retry policy used when a poll is interrupted by a transient error.

use anyhow::{Context, Result};
use sluice_client::ServiceClient;
use std::time::Duration;

/// How interrupted polls are resumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resumptions allowed after the first attempt
    pub max_retries: u32,

    /// Wait before the first resumption
    pub initial_delay: Duration,

    /// Upper bound for the doubling delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before resumption number `attempt` (1-based), doubling each time
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Queue and stream service endpoint (e.g., "http://localhost:4566")
    pub endpoint_url: String,

    /// Timeout for each HTTP request
    pub request_timeout: Duration,

    /// Resumption policy for interrupted polls
    pub retry: RetryPolicy,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(endpoint_url: String) -> Self {
        Self {
            endpoint_url,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.is_empty() {
            anyhow::bail!("endpoint_url cannot be empty");
        }

        if !self.endpoint_url.starts_with("http://") && !self.endpoint_url.starts_with("https://")
        {
            anyhow::bail!("endpoint_url must start with http:// or https://");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.retry.initial_delay.is_zero() {
            anyhow::bail!("retry initial_delay must be greater than 0");
        }

        if self.retry.max_delay < self.retry.initial_delay {
            anyhow::bail!("retry max_delay cannot be shorter than initial_delay");
        }

        Ok(())
    }

    /// Builds the service client described by this configuration
    pub fn build_client(&self) -> Result<ServiceClient> {
        let http = reqwest::blocking::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ServiceClient::with_client(&self.endpoint_url, http))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:4566".to_string())
    }
}
