//! Submission orchestrator: places applications on clusters and forwards every operation
//! to the manager of the owning cluster.

use ::std::sync::Arc;

use ::anyhow::anyhow;
use ::serde_json::Value;
use ::sparkgw_common::{
    application::{
        GatewayApplication, SparkApplication, APPLICATION_NAME_ANNOTATION, CLUSTER_ID_LABEL,
        MANAGED_BY_LABEL, MANAGED_BY_VALUE, NAMESPACE_ID_LABEL, USER_ANNOTATION,
    },
    cluster::{ClusterRegistry, Placement},
    error::{ErrorKind, GatewayError, Result},
    ledger::{Ledger, SubmissionRecord},
    naming::GeneratedName,
};
use ::tracing::{debug, error, info};

use crate::manager_client::ManagerClient;

pub struct Orchestrator<L> {
    registry: ClusterRegistry,
    http: reqwest::Client,
    ledger: Option<Arc<L>>,
    delete_not_found_is_success: bool,
}

impl<L: Ledger> Orchestrator<L> {
    pub fn new(
        registry: ClusterRegistry,
        http: reqwest::Client,
        ledger: Option<Arc<L>>,
        delete_not_found_is_success: bool,
    ) -> Self {
        Self {
            registry,
            http,
            ledger,
            delete_not_found_is_success,
        }
    }

    fn manager<'a>(&'a self, placement: &Placement<'a>) -> ManagerClient<'a> {
        ManagerClient::new(&placement.cluster.manager_url, &self.http)
            .with_credentials(placement.cluster.manager_credentials.as_ref())
    }

    /// Locate the application named by `id`.
    fn resolve(&self, id: &str) -> Result<Placement<'_>> {
        let name = GeneratedName::parse(id)?;
        self.registry.resolve(&name)
    }

    /// Submit a new application on behalf of `user`.
    ///
    /// The application is renamed to a generated name, labelled, created through the
    /// manager of the selected cluster and then recorded in the ledger. A failed ledger
    /// write is reported even though the application already exists on the cluster.
    pub async fn create(
        &self,
        user: &str,
        body: &[u8],
        requested_cluster: Option<&str>,
    ) -> Result<GatewayApplication> {
        let mut application = SparkApplication::parse(body)?;
        let placement = self
            .registry
            .select(application.namespace(), requested_cluster)?;
        let name = GeneratedName::generate(&placement.cluster.id, &placement.namespace.id);
        let application_name = application.name().to_owned();
        mark_as_managed(&mut application, &name, user, &application_name);

        let created = self.manager(&placement).create(&application).await?;
        info!(
            "Created SparkApplication {} ({}) on cluster {} for {}",
            name, application_name, placement.cluster.id, user
        );

        match &self.ledger {
            Some(ledger) => {
                let record = SubmissionRecord::new(&name, &application_name, user, &created)?;
                ledger.record_submission(record).await.map_err(|e| {
                    error!(
                        "SparkApplication {} exists on cluster {} without a ledger record: {}",
                        name, placement.cluster.id, e
                    );
                    GatewayError::internal(anyhow!(
                        "SparkApplication {} was created but could not be recorded: {}",
                        name,
                        e
                    ))
                })?;
            }
            None => debug!("No ledger configured, {} is not recorded", name),
        }
        Ok(GatewayApplication::new(placement.cluster.id.as_str(), created))
    }

    pub async fn get(&self, id: &str) -> Result<GatewayApplication> {
        let placement = self.resolve(id)?;
        let application = self
            .manager(&placement)
            .get(&placement.namespace.name, id)
            .await?;
        Ok(GatewayApplication::new(
            placement.cluster.id.as_str(),
            application,
        ))
    }

    /// Applications of `namespace` on the cluster selected like for a submission.
    pub async fn list(
        &self,
        namespace: &str,
        requested_cluster: Option<&str>,
    ) -> Result<Vec<GatewayApplication>> {
        let placement = self.registry.select(namespace, requested_cluster)?;
        let applications = self.manager(&placement).list(namespace).await?;
        Ok(applications
            .into_iter()
            .map(|app| GatewayApplication::new(placement.cluster.id.as_str(), app))
            .collect())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let placement = self.resolve(id)?;
        match self
            .manager(&placement)
            .delete(&placement.namespace.name, id)
            .await
        {
            Ok(()) => {
                info!("Deleted SparkApplication {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound && self.delete_not_found_is_success => {
                info!("SparkApplication {} is already gone: {}", id, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn status(&self, id: &str) -> Result<Value> {
        let placement = self.resolve(id)?;
        self.manager(&placement)
            .status(&placement.namespace.name, id)
            .await
    }

    pub async fn logs(&self, id: &str, lines: i64) -> Result<String> {
        let placement = self.resolve(id)?;
        self.manager(&placement)
            .logs(&placement.namespace.name, id, lines)
            .await
    }
}

/// Rename the application and attach the bookkeeping metadata.
fn mark_as_managed(
    application: &mut SparkApplication,
    name: &GeneratedName,
    user: &str,
    application_name: &str,
) {
    let metadata = &mut application.metadata;
    metadata.name = Some(name.to_string());
    // server populated fields of a document copied from another cluster
    metadata.uid = None;
    metadata.resource_version = None;
    metadata.creation_timestamp = None;
    application.status = None;

    application.set_annotation(APPLICATION_NAME_ANNOTATION, application_name);
    application.set_annotation(USER_ANNOTATION, user);
    application.set_label(MANAGED_BY_LABEL, MANAGED_BY_VALUE);
    application.set_label(CLUSTER_ID_LABEL, name.cluster_id.as_str());
    application.set_label(NAMESPACE_ID_LABEL, name.namespace_id.as_str());
}
