//! Configuration of a manager.

use ::core::time::Duration;
use ::std::net::SocketAddr;

use ::anyhow::anyhow;
use ::serde::Deserialize;
use ::sparkgw_common::{
    error::{GatewayError, Result},
    middleware::MiddlewareDefinition,
};

use crate::repository::ConfirmPolicy;

/// Configuration of the manager of one cluster.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    pub address: SocketAddr,
    /// Id of the managed cluster in the gateway's cluster table.
    pub cluster_id: String,
    /// Namespaces to watch, all namespaces when empty.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub middleware: Vec<MiddlewareDefinition>,
    #[serde(default = "default_log_lines")]
    pub default_log_lines: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_confirm_timeout_millis")]
    pub confirm_timeout_millis: u64,
    #[serde(default = "default_confirm_initial_backoff_millis")]
    pub confirm_initial_backoff_millis: u64,
    #[serde(default = "default_confirm_max_backoff_millis")]
    pub confirm_max_backoff_millis: u64,
    /// Consecutive watch failures after which the manager reports itself unready.
    #[serde(default = "default_watch_max_failures")]
    pub watch_max_failures: u32,
}

fn default_log_lines() -> i64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_confirm_timeout_millis() -> u64 {
    10_000
}

fn default_confirm_initial_backoff_millis() -> u64 {
    50
}

fn default_confirm_max_backoff_millis() -> u64 {
    1_000
}

fn default_watch_max_failures() -> u32 {
    5
}

impl ManagerConfig {
    /// Reject values the manager cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_log_lines", self.default_log_lines > 0),
            ("request_timeout_secs", self.request_timeout_secs > 0),
            ("confirm_timeout_millis", self.confirm_timeout_millis > 0),
            (
                "confirm_initial_backoff_millis",
                self.confirm_initial_backoff_millis > 0,
            ),
            ("watch_max_failures", self.watch_max_failures > 0),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, valid)| !valid) {
            return Err(invalid_config(format!("field `{}` must be positive", field)));
        }
        if self.confirm_max_backoff_millis < self.confirm_initial_backoff_millis {
            return Err(invalid_config(
                "field `confirm_max_backoff_millis` cannot be smaller than `confirm_initial_backoff_millis`",
            ));
        }
        Ok(())
    }

    pub fn confirm_policy(&self) -> ConfirmPolicy {
        ConfirmPolicy {
            initial_backoff: Duration::from_millis(self.confirm_initial_backoff_millis),
            max_backoff: Duration::from_millis(self.confirm_max_backoff_millis),
            timeout: Duration::from_millis(self.confirm_timeout_millis),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn invalid_config(message: impl Into<String>) -> GatewayError {
    GatewayError::internal(anyhow!(
        "Invalid manager configuration: {}",
        message.into()
    ))
}
