//! Application repository, the only path from the HTTP layer to the cluster.
//!
//! Reads are answered from the watch cache. Writes go to the API server and then wait
//! until the watch cache reflects them, so a successful response is always followed by
//! consistent reads on this manager.

use ::core::time::Duration;

use ::anyhow::anyhow;
use ::serde_json::Value;
use ::sparkgw_common::{
    application::SparkApplication,
    error::{GatewayError, Result},
};
use ::tracing::{debug, info};

use crate::{cache::CacheReader, cluster::ClusterApi};

/// Bounded exponential backoff used to wait for the cache after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

pub struct ApplicationRepository<C> {
    cluster: C,
    cache: CacheReader,
    confirm: ConfirmPolicy,
}

impl<C: ClusterApi> ApplicationRepository<C> {
    pub fn new(cluster: C, cache: CacheReader, confirm: ConfirmPolicy) -> Self {
        Self {
            cluster,
            cache,
            confirm,
        }
    }

    pub fn get(&self, namespace: &str, name: &str) -> Result<SparkApplication> {
        self.cache
            .get(namespace, name)
            .ok_or_else(|| not_found(namespace, name))
    }

    pub fn list(&self, namespace: &str) -> Vec<SparkApplication> {
        self.cache.list(namespace)
    }

    /// Create the application and return it once the watch cache has it.
    pub async fn create(&self, application: SparkApplication) -> Result<SparkApplication> {
        self.ensure_watched(application.namespace())?;
        let created = self.cluster.create(&application).await?;
        let namespace = application.namespace();
        let name = application.name();
        let uid = created.metadata.uid.clone();
        info!("Created SparkApplication {}/{}", namespace, name);

        // an object with another uid is an older incarnation under the same name
        let visible = self
            .wait_for("creation", namespace, name, || {
                self.cache
                    .get(namespace, name)
                    .filter(|cached| uid.is_none() || cached.metadata.uid == uid)
            })
            .await?;
        Ok(visible)
    }

    /// Delete the application and return once the watch cache no longer has it.
    /// A missing application is reported as [sparkgw_common::error::ErrorKind::NotFound].
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.ensure_watched(namespace)?;
        let uid = self
            .cache
            .get(namespace, name)
            .and_then(|cached| cached.metadata.uid);
        self.cluster.delete(namespace, name).await?;
        info!("Deleted SparkApplication {}/{}", namespace, name);

        self.wait_for("deletion", namespace, name, || {
            match self.cache.get(namespace, name) {
                None => Some(()),
                Some(cached) if cached.metadata.deletion_timestamp.is_some() => Some(()),
                Some(cached) if uid.is_some() && cached.metadata.uid != uid => Some(()),
                Some(_) => None,
            }
        })
        .await
    }

    pub fn status(&self, namespace: &str, name: &str) -> Result<Value> {
        self.get(namespace, name).map(|app| app.status_document())
    }

    /// Tail of the driver log.
    pub async fn logs(&self, namespace: &str, name: &str, tail_lines: i64) -> Result<String> {
        let application = self.get(namespace, name)?;
        let pod = application.driver_pod_name();
        debug!("Reading {} lines of driver pod {}/{}", tail_lines, namespace, pod);
        self.cluster
            .logs(namespace, &pod, tail_lines)
            .await
            .map_err(|e| e.context(format!("driver pod {} of {}/{}", pod, namespace, name)))
    }

    /// Writes are confirmed through the watch cache, so they are limited to watched namespaces.
    fn ensure_watched(&self, namespace: &str) -> Result<()> {
        if self.cache.covers(namespace) {
            Ok(())
        } else {
            Err(GatewayError::bad_request(anyhow!(
                "Namespace `{}` is not watched by this manager",
                namespace
            )))
        }
    }

    /// Poll `check` with backoff until it yields a value or the confirmation times out.
    async fn wait_for<T>(
        &self,
        what: &str,
        namespace: &str,
        name: &str,
        check: impl Fn() -> Option<T>,
    ) -> Result<T> {
        let ConfirmPolicy {
            initial_backoff,
            max_backoff,
            timeout,
        } = self.confirm;
        let poll = async {
            let mut backoff = initial_backoff;
            loop {
                if let Some(value) = check() {
                    return value;
                }
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2).min(max_backoff);
            }
        };
        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            GatewayError::internal(anyhow!(
                "The {} of SparkApplication {}/{} is not visible after {:?}",
                what,
                namespace,
                name,
                timeout
            ))
        })
    }
}

fn not_found(namespace: &str, name: &str) -> GatewayError {
    GatewayError::not_found(anyhow!("SparkApplication {}/{} not found", namespace, name))
}
