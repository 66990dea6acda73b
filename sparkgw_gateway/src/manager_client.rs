//! HTTP client of the managers.

use ::core::time::Duration;

use ::anyhow::anyhow;
use ::reqwest::{Method, RequestBuilder, Response};
use ::serde::de::DeserializeOwned;
use ::serde_json::Value;
use ::sparkgw_common::{
    application::SparkApplication,
    config::Credentials,
    error::{ErrorKind, GatewayError, Result},
};

/// Build the HTTP client shared by all [ManagerClient]s.
/// Every call to a manager is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(GatewayError::internal)
}

/// Client of the manager of one cluster.
/// Error responses of the manager keep their classification.
pub struct ManagerClient<'a> {
    /// Base URL of the manager.
    base_url: &'a str,
    client: &'a reqwest::Client,
    /// Sent as HTTP Basic authorization on every call when present.
    credentials: Option<&'a Credentials>,
}

impl<'a> ManagerClient<'a> {
    pub fn new(base_url: &'a str, client: &'a reqwest::Client) -> Self {
        Self {
            base_url,
            client,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<&'a Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.credentials {
            Some(Credentials { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            None => builder,
        }
    }

    pub async fn create(&self, application: &SparkApplication) -> Result<SparkApplication> {
        let url = self.build_url(application.namespace(), Some(application.name()));
        send(self.request(Method::POST, url).json(application))
            .await?
            .json_body()
            .await
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<SparkApplication> {
        let url = self.build_url(namespace, Some(name));
        send(self.request(Method::GET, url)).await?.json_body().await
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<SparkApplication>> {
        let url = self.build_url(namespace, None);
        send(self.request(Method::GET, url)).await?.json_body().await
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let url = self.build_url(namespace, Some(name));
        send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    pub async fn status(&self, namespace: &str, name: &str) -> Result<Value> {
        let url = self.build_url(namespace, Some(name)) + "/status";
        send(self.request(Method::GET, url)).await?.json_body().await
    }

    pub async fn logs(&self, namespace: &str, name: &str, lines: i64) -> Result<String> {
        let url = self.build_url(namespace, Some(name)) + "/logs";
        let response = send(self.request(Method::GET, url).query(&[("lines", lines)])).await?;
        response.0.text().await.map_err(invalid_response)
    }

    /// Build the URL of a namespace or of an application.
    fn build_url(&self, namespace: &str, name: Option<&str>) -> String {
        let base = self.base_url.trim_end_matches('/');
        match name {
            Some(name) => format!("{}/api/v1beta2/{}/{}", base, namespace, name),
            None => format!("{}/api/v1beta2/{}", base, namespace),
        }
    }
}

/// A successful response of a manager.
struct Success(Response);

impl Success {
    async fn json_body<T: DeserializeOwned>(self) -> Result<T> {
        self.0.json().await.map_err(invalid_response)
    }
}

/// Send the request, turning an error response into the [GatewayError] it describes.
async fn send(builder: RequestBuilder) -> Result<Success> {
    let response = builder
        .send()
        .await
        .map_err(|e| GatewayError::internal(anyhow!("Failed to reach the manager: {}", e)))?;
    let status = response.status();
    if status.is_success() {
        return Ok(Success(response));
    }
    let body = response.text().await.unwrap_or_default();
    // managers answer `{"error": "..."}`, anything else is passed on as text
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| format!("Manager responded {}: {}", status, body));
    Err(GatewayError::new(ErrorKind::from_status(status), anyhow!(message)))
}

fn invalid_response(e: reqwest::Error) -> GatewayError {
    GatewayError::internal(anyhow!("Invalid response from the manager: {}", e))
}
