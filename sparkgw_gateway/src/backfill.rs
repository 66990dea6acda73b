//! Ledger backfill: repairs ledger records missing after a creation whose ledger write
//! failed.

use ::core::time::Duration;
use ::std::sync::Arc;

use ::sparkgw_common::{
    application::{SparkApplication, APPLICATION_NAME_ANNOTATION},
    cluster::ClusterRegistry,
    ledger::{Ledger, SubmissionRecord},
    naming::GeneratedName,
    server::ShutdownListener,
};
use ::tracing::{debug, error, info, warn};

use crate::manager_client::ManagerClient;

/// Outcome of one backfill pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// gateway managed applications seen on the clusters
    pub scanned: usize,
    /// ledger records written by this pass
    pub repaired: usize,
    /// namespaces that could not be listed and records that could not be checked or written
    pub failed: usize,
}

/// Scan every registered namespace once and record the managed applications the ledger
/// does not know.
pub async fn backfill_once<L: Ledger>(
    registry: &ClusterRegistry,
    http: &reqwest::Client,
    ledger: &L,
) -> BackfillReport {
    let mut report = BackfillReport::default();
    for cluster in registry.clusters() {
        let manager = ManagerClient::new(&cluster.manager_url, http)
            .with_credentials(cluster.manager_credentials.as_ref());
        for namespace in &cluster.namespaces {
            let applications = match manager.list(&namespace.name).await {
                Ok(applications) => applications,
                Err(e) => {
                    warn!(
                        "Backfill cannot list namespace {} of cluster {}: {}",
                        namespace.name, cluster.id, e
                    );
                    report.failed += 1;
                    continue;
                }
            };
            for application in applications.iter().filter(|app| app.is_managed()) {
                // applications renamed by hand are not ours to record
                let Ok(name) = GeneratedName::parse(application.name()) else {
                    debug!("Backfill skips {}", application.name());
                    continue;
                };
                report.scanned += 1;
                match repair(ledger, &name, application).await {
                    Ok(true) => report.repaired += 1,
                    Ok(false) => {}
                    Err(e) => {
                        error!("Backfill failed for {}: {}", name, e);
                        report.failed += 1;
                    }
                }
            }
        }
    }
    report
}

/// Write the record of `application` if missing, returning whether it was written.
async fn repair<L: Ledger>(
    ledger: &L,
    name: &GeneratedName,
    application: &SparkApplication,
) -> sparkgw_common::error::Result<bool> {
    if ledger.get_submission(&name.uuid.to_string()).await?.is_some() {
        return Ok(false);
    }
    let application_name = application
        .annotation(APPLICATION_NAME_ANNOTATION)
        .unwrap_or(application.name());
    let record = SubmissionRecord::new(name, application_name, application.user(), application)?;
    ledger.record_submission(record).await?;
    warn!("Repaired the missing ledger record of {}", name);
    Ok(true)
}

/// Run [backfill_once] every `interval` until shutdown.
pub async fn run_ledger_backfill<L: Ledger>(
    registry: ClusterRegistry,
    http: reqwest::Client,
    ledger: Arc<L>,
    interval: Duration,
    mut shutdown: ShutdownListener,
) {
    info!("Ledger backfill runs every {:?}", interval);
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        tokio::select! {
            _ = shutdown.wait() => break,
            report = backfill_once(&registry, &http, ledger.as_ref()) => {
                info!("Ledger backfill finished: {:?}", report);
            }
        }
    }
    info!("Ledger backfill stopped");
}
