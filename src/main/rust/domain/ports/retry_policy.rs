use std::time::Duration;

/// Port for reconnection retry policies
pub trait RetryPolicy: Send {
    /// Delay before the given 1-based attempt, or `None` to stop retrying
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Number of attempts the policy allows before stopping
    fn max_retries(&self) -> u32;

    /// Clear policy-local state once a connection is freshly established.
    /// Stateless policies keep the default no-op.
    fn reset(&mut self) {}
}
