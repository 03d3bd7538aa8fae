//! Exponential backoff for the search backend's "too many requests" page.

use std::time::Duration;

/// Wait before the first retry of a run.
pub const INITIAL_RETRY_SECS: u64 = 60;
/// Wait a retry starts from again once a fetch gets through.
pub const FLOOR_RETRY_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_secs: u64,
    pub floor_secs: u64,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_secs: INITIAL_RETRY_SECS,
            floor_secs: FLOOR_RETRY_SECS,
            max_retries: None,
        }
    }
}

/// Retry delay carried across every page and date range of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffState {
    retry_secs: u64,
    floor_secs: u64,
}

impl BackoffState {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            retry_secs: policy.initial_secs,
            floor_secs: policy.floor_secs,
        }
    }

    pub fn retry_secs(&self) -> u64 {
        self.retry_secs
    }

    /// Returns how long to wait before retrying and doubles the wait for the
    /// next occurrence.
    pub fn on_rate_limited(&mut self) -> Duration {
        let wait = Duration::from_secs(self.retry_secs);
        self.retry_secs = self.retry_secs.saturating_mul(2);
        wait
    }

    pub fn on_success(&mut self) {
        self.retry_secs = self.floor_secs;
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(&BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_initial_value() {
        let mut state = BackoffState::default();
        let waits: Vec<u64> = (0..4).map(|_| state.on_rate_limited().as_secs()).collect();
        assert_eq!(waits, vec![60, 120, 240, 480]);
    }

    #[test]
    fn resets_to_floor_after_success() {
        let mut state = BackoffState::default();
        state.on_rate_limited();
        state.on_rate_limited();
        state.on_success();
        assert_eq!(state.retry_secs(), FLOOR_RETRY_SECS);
        assert_eq!(state.on_rate_limited().as_secs(), 10);
        assert_eq!(state.on_rate_limited().as_secs(), 20);
    }

    #[test]
    fn never_overflows() {
        let mut state = BackoffState::new(&BackoffPolicy {
            initial_secs: u64::MAX / 2 + 1,
            ..Default::default()
        });
        state.on_rate_limited();
        assert_eq!(state.retry_secs(), u64::MAX);
    }
}
