//! Operator configuration, read from flags or the environment.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::constants::defaults;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Clone, Debug)]
#[command(
    name = "mongo-operator",
    about = "Reconciles MongoCluster resources into per-replica Deployments, PVCs and Services",
    version
)]
pub struct OperatorConfig {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "MONGO_OPERATOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Address of the metrics and health endpoint
    #[arg(long, env = "MONGO_OPERATOR_METRICS_ADDR", default_value = "0.0.0.0:8080")]
    pub metrics_addr: String,

    /// Only watch MongoClusters in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Resync interval after a successful reconciliation, in seconds
    #[arg(long, env = "MONGO_OPERATOR_REQUEUE_SECS", default_value_t = defaults::REQUEUE_SECS)]
    pub requeue_secs: u64,

    /// Retry interval after a transient failure, in seconds
    #[arg(long, env = "MONGO_OPERATOR_ERROR_REQUEUE_SECS", default_value_t = defaults::REQUEUE_ERROR_SECS)]
    pub error_requeue_secs: u64,

    /// Retry interval after a validation or invariant failure, in seconds
    #[arg(
        long,
        env = "MONGO_OPERATOR_PERMANENT_ERROR_REQUEUE_SECS",
        default_value_t = defaults::REQUEUE_PERMANENT_ERROR_SECS
    )]
    pub permanent_error_requeue_secs: u64,
}

impl OperatorConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn error_requeue_interval(&self, transient: bool) -> Duration {
        if transient {
            Duration::from_secs(self.error_requeue_secs)
        } else {
            Duration::from_secs(self.permanent_error_requeue_secs)
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: LogFormat::Text,
            metrics_addr: "0.0.0.0:8080".into(),
            watch_namespace: None,
            requeue_secs: defaults::REQUEUE_SECS,
            error_requeue_secs: defaults::REQUEUE_ERROR_SECS,
            permanent_error_requeue_secs: defaults::REQUEUE_PERMANENT_ERROR_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = OperatorConfig::parse_from(["mongo-operator"]);
        assert_eq!(config.metrics_addr, "0.0.0.0:8080");
        assert_eq!(config.requeue_interval(), Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_parse_flags() {
        let config = OperatorConfig::parse_from([
            "mongo-operator",
            "--watch-namespace",
            "databases",
            "--log-format",
            "json",
            "--error-requeue-secs",
            "5",
        ]);
        assert_eq!(config.watch_namespace.as_deref(), Some("databases"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.error_requeue_interval(true), Duration::from_secs(5));
        assert_eq!(config.error_requeue_interval(false), Duration::from_secs(300));
    }
}
