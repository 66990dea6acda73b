//! Submission ledger, the gateway's durable record of every created application.

use ::core::future::Future;

use ::anyhow::anyhow;
use ::serde::{Deserialize, Serialize};
use ::surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Surreal,
};
use ::time::OffsetDateTime;
use ::tracing::info;

use crate::{
    application::SparkApplication,
    config::{Credentials, DatabaseConfig},
    error::{GatewayError, Result},
    naming::GeneratedName,
};

/// One row of the ledger, keyed by the uuid segment of the generated name.
/// Written once when the application is created and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub generated_name: String,
    /// name the application was submitted with
    pub application_name: String,
    pub cluster_id: String,
    pub namespace: String,
    pub user: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// the submitted document as JSON text
    pub spec: String,
}

impl SubmissionRecord {
    pub fn new(
        name: &GeneratedName,
        application_name: &str,
        user: &str,
        application: &SparkApplication,
    ) -> Result<Self> {
        let spec = serde_json::to_string(application).map_err(GatewayError::internal)?;
        Ok(Self {
            id: name.uuid.to_string(),
            generated_name: name.to_string(),
            application_name: application_name.to_owned(),
            cluster_id: name.cluster_id.clone(),
            namespace: application.namespace().to_owned(),
            user: user.to_owned(),
            created_at: OffsetDateTime::now_utc(),
            spec,
        })
    }
}

/// Durable store of [SubmissionRecord]s.
pub trait Ledger: Send + Sync + 'static {
    /// Write a new record. Fails if a record with the same id already exists.
    fn record_submission(&self, record: SubmissionRecord) -> impl Future<Output = Result<()>> + Send;

    /// Return `Ok(None)` if there is no record with this id.
    fn get_submission(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<SubmissionRecord>>> + Send;
}

/// Ledger in SurrealDB.
#[derive(Clone)]
pub struct SurrealLedger {
    client: Surreal<Any>,
}

impl SurrealLedger {
    const TABLE: &'static str = "submissions";
    const NAMESPACE: &'static str = "spark_gateway";
    const DATABASE: &'static str = "spark_gateway";

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let client = connect(config.uri.as_str())
            .await
            .map_err(|e| fail_to_connect(&config.uri, e))?;
        if let Some(Credentials { username, password }) = &config.credentials {
            client
                .signin(Root { username, password })
                .await
                .map_err(|e| fail_to_connect(&config.uri, e))?;
        }
        client
            .use_ns(Self::NAMESPACE)
            .use_db(Self::DATABASE)
            .await
            .map_err(|e| fail_to_connect(&config.uri, e))?;
        info!("Connected to ledger database {}", config.uri);
        Ok(Self { client })
    }
}

impl Ledger for SurrealLedger {
    async fn record_submission(&self, record: SubmissionRecord) -> Result<()> {
        // CREATE fails on an existing record, which serializes writers of the same id
        let sql = r#"
            CREATE type::thing($tb, $id)
            SET info = $record
            RETURN NONE;
        "#;
        let id = record.id.clone();
        self.client
            .query(sql)
            .bind(("tb", Self::TABLE))
            .bind(("id", id.clone()))
            .bind(("record", record))
            .await
            .and_then(|response| response.check())
            .map_err(|e| {
                GatewayError::internal(anyhow!("Failed to write ledger record {}: {}", id, e))
            })?;
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        let sql = r#"
            SELECT VALUE info
            FROM ONLY type::thing($tb, $id);
        "#;
        let record: Option<SubmissionRecord> = self
            .client
            .query(sql)
            .bind(("tb", Self::TABLE))
            .bind(("id", id.to_owned()))
            .await
            .and_then(|mut response| response.take(0))
            .map_err(|e| {
                GatewayError::internal(anyhow!("Failed to read ledger record {}: {}", id, e))
            })?;
        Ok(record)
    }
}

fn fail_to_connect(uri: &str, e: surrealdb::Error) -> GatewayError {
    GatewayError::internal(anyhow!("Failed to connect to database {}: {}", uri, e))
}
