//! Configuration of the gateway.

use ::core::{num::NonZeroU64, time::Duration};
use ::std::net::SocketAddr;

use ::serde::Deserialize;
use ::sparkgw_common::{
    cluster::ClusterConfig, config::DatabaseConfig, middleware::MiddlewareDefinition,
};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub address: SocketAddr,
    /// Managed clusters, in routing order.
    pub clusters: Vec<ClusterConfig>,
    #[serde(default)]
    pub middleware: Vec<MiddlewareDefinition>,
    /// Log lines returned when a request does not ask for a number.
    #[serde(default = "default_log_lines")]
    pub default_log_lines: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_manager_timeout_secs")]
    pub manager_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Answer a DELETE of an application the manager does not know with success.
    #[serde(default)]
    pub delete_not_found_is_success: bool,
    /// Ledger database, no ledger is kept when absent.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Period of the ledger backfill, disabled when absent.
    #[serde(default)]
    pub ledger_backfill_interval_secs: Option<NonZeroU64>,
}

fn default_log_lines() -> i64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_manager_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn manager_timeout(&self) -> Duration {
        Duration::from_secs(self.manager_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn ledger_backfill_interval(&self) -> Option<Duration> {
        self.ledger_backfill_interval_secs
            .map(|secs| Duration::from_secs(secs.get()))
    }
}

#[cfg(test)]
mod tests {
    use ::serde_json::{from_value, json};

    use super::*;

    #[test]
    fn missing_field_clusters() {
        let result = from_value::<GatewayConfig>(json!({"address": "127.0.0.1:8080"}));
        assert_eq!(result.unwrap_err().to_string(), "missing field `clusters`");
    }

    #[test]
    fn deny_unknown_fields() {
        let result = from_value::<GatewayConfig>(json!({
            "address": "127.0.0.1:8080",
            "clusters": [],
            "auth_enable": true
        }));
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("unknown field `auth_enable`"));
    }

    #[test]
    fn zero_backfill_interval_is_rejected() {
        let result = from_value::<GatewayConfig>(json!({
            "address": "127.0.0.1:8080",
            "clusters": [],
            "ledger_backfill_interval_secs": 0
        }));
        assert!(result.is_err());
    }

    #[test]
    fn deserialize_gateway_config() -> anyhow::Result<()> {
        let config: GatewayConfig = from_value(json!({
            "address": "0.0.0.0:8080",
            "clusters": [{
                "id": "c1",
                "name": "cluster one",
                "master_url": "https://c1.example.com",
                "manager_url": "http://manager.c1:8080",
                "namespaces": [{"name": "ns", "id": "ns1"}]
            }],
            "middleware": [{"type": "header_field", "conf": {"headers": [{"key": "X-User"}]}}],
            "database": {"credentials": null, "uri": "mem://"},
            "ledger_backfill_interval_secs": 300
        }))?;
        assert_eq!(config.clusters.len(), 1);
        assert_eq!(config.middleware.len(), 1);
        assert_eq!(config.default_log_lines, 100);
        assert!(!config.delete_not_found_is_success);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.manager_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(
            config.database,
            Some(DatabaseConfig {
                credentials: None,
                uri: "mem://".to_owned()
            })
        );
        assert_eq!(
            config.ledger_backfill_interval(),
            Some(Duration::from_secs(300))
        );
        Ok(())
    }
}
