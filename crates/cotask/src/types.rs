//! Configuration and statistics for the execution engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionKind;
use crate::error::{ConfigError, ConfigResult};

/// Configuration for the [`Engine`](crate::Engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for awaiting a chain in `execute_async` (None for no timeout)
    ///
    /// The chain itself keeps running after the timeout fires; only the
    /// caller stops waiting.
    pub execution_timeout: Option<Duration>,

    /// Log failed executions at error level
    pub log_failures: bool,

    /// Log cancelled executions at info level
    pub log_cancellations: bool,

    /// Keep running counters in [`ExecutionStats`]
    pub collect_stats: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_timeout: None,
            log_failures: true,
            log_cancellations: false,
            collect_stats: true,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution timeout
    pub fn with_execution_timeout(mut self, timeout: Duration) -> ConfigResult<Self> {
        if timeout.is_zero() {
            return Err(ConfigError::invalid_timeout(timeout));
        }
        self.execution_timeout = Some(timeout);
        Ok(self)
    }

    pub fn with_failure_logging(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    pub fn with_cancellation_logging(mut self, enabled: bool) -> Self {
        self.log_cancellations = enabled;
        self
    }

    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.collect_stats = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(timeout) = self.execution_timeout {
            if timeout.is_zero() {
                return Err(ConfigError::invalid_timeout(timeout));
            }
        }
        Ok(())
    }

    /// Create a configuration suited to tests: bounded waits, everything logged
    pub fn for_testing() -> Self {
        Self {
            execution_timeout: Some(Duration::from_secs(10)),
            log_failures: true,
            log_cancellations: true,
            collect_stats: true,
        }
    }

    /// Create a configuration that logs nothing and keeps no statistics
    pub fn quiet() -> Self {
        Self {
            execution_timeout: None,
            log_failures: false,
            log_cancellations: false,
            collect_stats: false,
        }
    }
}

/// Execution statistics accumulated by an engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Number of root executions that completed
    pub total_executions: usize,

    pub succeeded: usize,

    pub cancelled: usize,

    pub failed: usize,

    /// Sum of the durations of all completed executions
    pub total_duration: Duration,

    /// Longest single execution
    pub max_duration: Duration,
}

impl ExecutionStats {
    /// Account for one finished execution
    pub fn record(&mut self, outcome: CompletionKind, duration: Duration) {
        self.total_executions += 1;
        match outcome {
            CompletionKind::Succeeded => self.succeeded += 1,
            CompletionKind::Cancelled => self.cancelled += 1,
            CompletionKind::Failed => self.failed += 1,
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    /// Average execution duration, zero when nothing ran yet
    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.total_executions) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total_duration / count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.execution_timeout.is_none());
        assert!(config.log_failures);
        assert!(!config.log_cancellations);
        assert!(config.collect_stats);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_execution_timeout(Duration::from_secs(2))
            .unwrap()
            .with_cancellation_logging(true)
            .with_failure_logging(false)
            .with_stats(false);

        assert_eq!(config.execution_timeout, Some(Duration::from_secs(2)));
        assert!(config.log_cancellations);
        assert!(!config.log_failures);
        assert!(!config.collect_stats);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let result = EngineConfig::new().with_execution_timeout(Duration::ZERO);
        assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));

        let config = EngineConfig {
            execution_timeout: Some(Duration::ZERO),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        let testing = EngineConfig::for_testing();
        assert!(testing.validate().is_ok());
        assert!(testing.execution_timeout.is_some());
        assert!(testing.log_cancellations);

        let quiet = EngineConfig::quiet();
        assert!(quiet.validate().is_ok());
        assert!(!quiet.log_failures);
        assert!(!quiet.collect_stats);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = ExecutionStats::default();
        assert_eq!(stats.average_duration(), Duration::ZERO);

        stats.record(CompletionKind::Succeeded, Duration::from_millis(10));
        stats.record(CompletionKind::Cancelled, Duration::from_millis(30));
        stats.record(CompletionKind::Failed, Duration::from_millis(20));

        assert_eq!(stats.total_executions, 3);
        assert_eq!((stats.succeeded, stats.cancelled, stats.failed), (1, 1, 1));
        assert_eq!(stats.total_duration, Duration::from_millis(60));
        assert_eq!(stats.max_duration, Duration::from_millis(30));
        assert_eq!(stats.average_duration(), Duration::from_millis(20));
    }
}
