use super::types::*;
use super::utils::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_policy: BackoffPolicy::Exponential { factor: 2.0 },
            conditions: Vec::new(),
        }
    }
}

impl CategoryConfig {
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        calculate_delay(self, attempt)
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            total_retries: 0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            categories: Default::default(),
            retry_states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl RetryConfig {
    /// Two retries for transient server, gateway, timeout and rate-limit
    /// responses, and for connection failures. Vendor download servers
    /// regularly answer 5xx under load.
    pub fn firmware_defaults() -> Self {
        let mut config = Self::default();
        let category = |conditions: Vec<RetryCondition>| CategoryConfig {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_policy: BackoffPolicy::Exponential { factor: 2.0 },
            conditions,
        };
        let statuses = |codes: &[u16]| -> Vec<RetryCondition> {
            codes.iter().map(|code| RetryCondition::StatusCode(*code)).collect()
        };

        config.categories.insert(
            RetryCategory::ServerError,
            category(statuses(&[500, 502, 503, 504, 522, 524])),
        );
        config.categories.insert(
            RetryCategory::Timeout,
            category(vec![RetryCondition::StatusCode(408), RetryCondition::Transport]),
        );
        config
            .categories
            .insert(RetryCategory::RateLimit, category(statuses(&[429])));
        config
    }

    pub fn should_retry(
        &self,
        url: &Url,
        status: u16,
        content: &str,
    ) -> Option<(RetryCategory, Duration)> {
        self.next_retry(url, |condition| {
            retry_condition_should_apply(condition, status, content)
        })
    }

    /// Retry decision for a fetch that failed before any response arrived.
    pub fn should_retry_transport(&self, url: &Url) -> Option<(RetryCategory, Duration)> {
        self.next_retry(url, |condition| matches!(condition, RetryCondition::Transport))
    }

    fn next_retry<F>(&self, url: &Url, applies: F) -> Option<(RetryCategory, Duration)>
    where
        F: Fn(&RetryCondition) -> bool,
    {
        let url_str = url.to_string();
        let mut states = self.retry_states.write();
        let state = states.entry(url_str).or_default();

        for (category, config) in &self.categories {
            let current_retries = state.counts.get(category).copied().unwrap_or(0);
            if current_retries >= config.max_retries {
                continue;
            }

            if config.conditions.iter().any(&applies) {
                state.counts.insert(category.clone(), current_retries + 1);
                state.total_retries += 1;
                return Some((category.clone(), calculate_delay(config, current_retries)));
            }
        }
        None
    }

    pub fn get_retry_state(&self, url: &Url) -> RetryState {
        self.retry_states
            .read()
            .get(&url.to_string())
            .cloned()
            .unwrap_or_else(RetryState::new)
    }

    /// Drops the retry budget used for `url`, returning what it was.
    pub fn take_retry_state(&self, url: &Url) -> RetryState {
        self.retry_states
            .write()
            .remove(&url.to_string())
            .unwrap_or_else(RetryState::new)
    }
}
