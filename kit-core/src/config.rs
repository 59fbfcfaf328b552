//! Controller configuration

use std::time::Duration;

/// Name the NAT gateway controller tags its resources with
pub const DEFAULT_CONTROLLER_NAME: &str = "natgateway";

/// Default bound on the wait-until-available step (10 minutes)
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 600;

/// Tunables for a convergence controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Controller name, embedded in tags and log lines
    pub name: String,
    /// Upper bound on waiting for a created gateway to become available
    pub wait_timeout: Duration,
    /// Requeue interval after a successful pass (periodic drift check)
    pub requeue_after_success: Duration,
    /// Requeue interval after a failed pass
    pub requeue_after_failure: Duration,
    /// Requeue interval while a dependency is missing
    pub requeue_after_waiting: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTROLLER_NAME.to_string(),
            wait_timeout: Duration::from_secs(DEFAULT_WAIT_TIMEOUT_SECS),
            requeue_after_success: Duration::from_secs(45),
            requeue_after_failure: Duration::from_secs(10),
            requeue_after_waiting: Duration::from_secs(5),
        }
    }
}

impl ControllerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_requeue_after_success(mut self, after: Duration) -> Self {
        self.requeue_after_success = after;
        self
    }

    pub fn with_requeue_after_failure(mut self, after: Duration) -> Self {
        self.requeue_after_failure = after;
        self
    }

    pub fn with_requeue_after_waiting(mut self, after: Duration) -> Self {
        self.requeue_after_waiting = after;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.name, "natgateway");
        assert_eq!(config.wait_timeout, Duration::from_secs(600));
        assert!(config.requeue_after_waiting < config.requeue_after_failure);
    }

    #[test]
    fn builder_overrides() {
        let config = ControllerConfig::default()
            .with_name("natgw-test")
            .with_wait_timeout(Duration::from_millis(50));
        assert_eq!(config.name, "natgw-test");
        assert_eq!(config.wait_timeout, Duration::from_millis(50));
    }
}
