//! Write access to the Kubernetes cluster.

use ::core::future::Future;

use ::k8s_openapi::api::core::v1::Pod;
use ::kube::{
    api::{DeleteParams, LogParams, PostParams},
    Api, Client,
};
use ::sparkgw_common::{
    application::SparkApplication,
    error::{GatewayError, Result},
};
use ::tracing::debug;

/// Calls that go to the API server directly instead of through the watch cache.
/// Implementations classify every failure with [GatewayError::from_kube] or an equivalent.
pub trait ClusterApi: Send + Sync + 'static {
    /// Create the application in its own namespace and return the object as stored.
    fn create(
        &self,
        application: &SparkApplication,
    ) -> impl Future<Output = Result<SparkApplication>> + Send;

    fn delete(&self, namespace: &str, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Return the last `tail_lines` lines of the log of a pod.
    fn logs(
        &self,
        namespace: &str,
        pod: &str,
        tail_lines: i64,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// [ClusterApi] backed by a kube client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn applications(&self, namespace: &str) -> Api<SparkApplication> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl ClusterApi for KubeCluster {
    async fn create(&self, application: &SparkApplication) -> Result<SparkApplication> {
        debug!(
            "Creating SparkApplication {}/{}",
            application.namespace(),
            application.name()
        );
        self.applications(application.namespace())
            .create(&PostParams::default(), application)
            .await
            .map_err(GatewayError::from_kube)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        debug!("Deleting SparkApplication {}/{}", namespace, name);
        self.applications(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(GatewayError::from_kube)
    }

    async fn logs(&self, namespace: &str, pod: &str, tail_lines: i64) -> Result<String> {
        let params = LogParams {
            tail_lines: Some(tail_lines),
            ..Default::default()
        };
        Api::<Pod>::namespaced(self.client.clone(), namespace)
            .logs(pod, &params)
            .await
            .map_err(GatewayError::from_kube)
    }
}
