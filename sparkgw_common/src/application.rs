//! The Spark application custom resource, as far as Spark Gateway needs to understand it.
//!
//! `spec` and `status` are opaque documents owned by the Spark operator. Only the metadata
//! is interpreted here.

use ::std::borrow::Cow;

use ::anyhow::anyhow;
use ::k8s_openapi::{apimachinery::pkg::apis::meta::v1::ObjectMeta, NamespaceResourceScope};
use ::kube::Resource;
use ::serde::{Deserialize, Serialize};
use ::serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

pub const GROUP: &str = "sparkoperator.k8s.io";
pub const VERSION: &str = "v1beta2";
pub const API_VERSION: &str = "sparkoperator.k8s.io/v1beta2";
pub const KIND: &str = "SparkApplication";
pub const PLURAL: &str = "sparkapplications";

/// Annotation keeping the name the caller submitted the application with.
pub const APPLICATION_NAME_ANNOTATION: &str = "applicationName";
/// Annotation keeping the authenticated user who submitted the application.
pub const USER_ANNOTATION: &str = "spark-gateway/user";
pub const MANAGED_BY_LABEL: &str = "spark-gateway/managed-by";
pub const MANAGED_BY_VALUE: &str = "spark-gateway";
pub const CLUSTER_ID_LABEL: &str = "spark-gateway/cluster-id";
pub const NAMESPACE_ID_LABEL: &str = "spark-gateway/namespace-id";

/// Identity reported for requests no middleware authenticated.
pub const ANONYMOUS_USER: &str = "anonymous";

/// `SparkApplication` of the Spark operator (`sparkoperator.k8s.io/v1beta2`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkApplication {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl Resource for SparkApplication {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(PLURAL)
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl SparkApplication {
    /// Parse and syntactically validate a submitted document.
    ///
    /// The document must carry a non-empty `metadata.name` and `metadata.namespace`
    /// and an object `spec`. Missing `apiVersion` and `kind` are filled in.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut app: Self = serde_json::from_slice(body).map_err(|e| {
            GatewayError::bad_request(anyhow!("Invalid Spark application: {}", e))
        })?;
        if app.name().is_empty() {
            return Err(GatewayError::bad_request(anyhow!(
                "Invalid Spark application: metadata.name is required"
            )));
        }
        if app.namespace().is_empty() {
            return Err(GatewayError::bad_request(anyhow!(
                "Invalid Spark application: metadata.namespace is required"
            )));
        }
        match app.api_version.as_str() {
            "" => app.api_version = API_VERSION.to_owned(),
            API_VERSION => {}
            other => {
                return Err(GatewayError::bad_request(anyhow!(
                    "Invalid Spark application: unsupported apiVersion `{}`",
                    other
                )))
            }
        }
        match app.kind.as_str() {
            "" => app.kind = KIND.to_owned(),
            KIND => {}
            other => {
                return Err(GatewayError::bad_request(anyhow!(
                    "Invalid Spark application: unsupported kind `{}`",
                    other
                )))
            }
        }
        Ok(app)
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(key))
            .map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(key.to_owned(), value.into());
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(key.to_owned(), value.into());
    }

    /// Whether the application was submitted through Spark Gateway.
    pub fn is_managed(&self) -> bool {
        self.label(MANAGED_BY_LABEL) == Some(MANAGED_BY_VALUE)
    }

    /// User who submitted the application.
    pub fn user(&self) -> &str {
        self.annotation(USER_ANNOTATION).unwrap_or(ANONYMOUS_USER)
    }

    /// Name of the driver pod, as reported by the Spark operator.
    /// Before the operator reports it, the operator's naming convention is assumed.
    pub fn driver_pod_name(&self) -> String {
        self.status
            .as_ref()
            .and_then(|status| status.pointer("/driverInfo/podName"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{}-driver", self.name()))
    }

    /// Status sub-document, an empty object before the operator reports anything.
    pub fn status_document(&self) -> Value {
        self.status
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// Spark application as returned to the clients of the gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayApplication {
    pub cluster_id: String,
    pub user: String,
    pub application: SparkApplication,
}

impl GatewayApplication {
    pub fn new(cluster_id: impl Into<String>, application: SparkApplication) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            user: application.user().to_owned(),
            application,
        }
    }
}

#[cfg(test)]
mod tests {
    use ::serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn parse(value: Value) -> Result<SparkApplication> {
        SparkApplication::parse(value.to_string().as_bytes())
    }

    #[test]
    fn parse_fills_type_meta() -> Result<()> {
        let app = parse(json!({
            "metadata": {"name": "job1", "namespace": "ns"},
            "spec": {"type": "Scala", "mainClass": "org.example.Main"}
        }))?;
        assert_eq!(app.api_version, API_VERSION);
        assert_eq!(app.kind, KIND);
        assert_eq!(app.name(), "job1");
        assert_eq!(app.namespace(), "ns");
        assert_eq!(app.spec["mainClass"], json!("org.example.Main"));
        Ok(())
    }

    #[test]
    fn parse_rejects_invalid_documents() {
        let cases = [
            json!("not an object"),
            json!({"metadata": {"name": "job1", "namespace": "ns"}}),
            json!({"metadata": {"name": "job1", "namespace": "ns"}, "spec": []}),
            json!({"metadata": {"namespace": "ns"}, "spec": {}}),
            json!({"metadata": {"name": "job1"}, "spec": {}}),
            json!({"metadata": {"name": "", "namespace": "ns"}, "spec": {}}),
            json!({"kind": "Pod", "metadata": {"name": "job1", "namespace": "ns"}, "spec": {}}),
            json!({"apiVersion": "v1", "metadata": {"name": "job1", "namespace": "ns"}, "spec": {}}),
        ];
        for case in cases {
            let result = parse(case.clone());
            assert!(
                result.is_err_and(|e| e.kind() == ErrorKind::BadRequest),
                "{} should be rejected",
                case
            );
        }
        let result = SparkApplication::parse(b"{not json");
        assert!(result.is_err_and(|e| e.kind() == ErrorKind::BadRequest));
    }

    #[test]
    fn serialize_with_type_meta() -> Result<()> {
        let app = parse(json!({
            "metadata": {"name": "job1", "namespace": "ns"},
            "spec": {}
        }))?;
        let value = serde_json::to_value(&app).map_err(GatewayError::internal)?;
        assert_eq!(value["apiVersion"], json!(API_VERSION));
        assert_eq!(value["kind"], json!(KIND));
        assert!(value.get("status").is_none());
        Ok(())
    }

    #[test]
    fn driver_pod_name_from_status() -> Result<()> {
        let mut app = parse(json!({
            "metadata": {"name": "job1", "namespace": "ns"},
            "spec": {}
        }))?;
        assert_eq!(app.driver_pod_name(), "job1-driver");
        assert_eq!(app.status_document(), json!({}));

        app.status = Some(json!({"driverInfo": {"podName": "custom-driver"}}));
        assert_eq!(app.driver_pod_name(), "custom-driver");
        Ok(())
    }

    #[test]
    fn user_defaults_to_anonymous() -> Result<()> {
        let mut app = parse(json!({
            "metadata": {"name": "job1", "namespace": "ns"},
            "spec": {}
        }))?;
        assert_eq!(app.user(), ANONYMOUS_USER);
        app.set_annotation(USER_ANNOTATION, "alice");
        assert_eq!(GatewayApplication::new("c1", app).user, "alice");
        Ok(())
    }
}
