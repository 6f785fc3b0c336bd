//! HTTP client for the Eyevinn Open Source Cloud control plane.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use control_plane_interface::{
    ControlPlane, ControlPlaneError, ServiceAccessToken, SubmittedJob, TranscodeClient,
    TranscodeJob,
};
use osc_shared_types::{
    Instance, InstancePort, InstanceState, OscError, Result, ServiceId, Subscription,
};

/// Default deployment environment of the control plane.
pub const DEFAULT_ENVIRONMENT: &str = "prod";

/// Control plane client authenticated with a personal access token.
pub struct OscControlPlane {
    client: Client,
    personal_access_token: SecretString,
    environment: String,
}

impl OscControlPlane {
    pub fn new(personal_access_token: SecretString, environment: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            personal_access_token,
            environment: environment.into(),
        }
    }

    fn token_url(&self) -> String {
        format!("https://token.svc.{}.osaas.io/servicetoken", self.environment)
    }

    fn catalog_url(&self, service: ServiceId) -> String {
        format!(
            "https://catalog.svc.{}.osaas.io/services/{}",
            self.environment, service
        )
    }

    fn subscriptions_url(&self) -> String {
        format!("https://money.svc.{}.osaas.io/mysubscriptions", self.environment)
    }

    /// Add the personal access token header.
    fn with_pat(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(
            "x-pat-jwt",
            format!("Bearer {}", self.personal_access_token.expose_secret()),
        )
    }

    /// Add the service access token header.
    fn with_sat(builder: RequestBuilder, token: &ServiceAccessToken) -> RequestBuilder {
        builder.header("x-jwt", format!("Bearer {}", token.as_str()))
    }

    /// Resolve the instance API base of a service through the catalog.
    async fn service_api_url(&self, service: ServiceId) -> Result<Url> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CatalogEntry {
            api_url: String,
        }

        let response = self
            .with_pat(self.client.get(self.catalog_url(service)))
            .send()
            .await
            .map_err(transport)?;
        let entry: CatalogEntry = handle_response(response).await?;
        let url = Url::parse(entry.api_url.trim_end_matches('/'))
            .map_err(|e| ControlPlaneError::Decode(format!("apiUrl: {}", e)))?;
        Ok(url)
    }

    /// `{apiUrl}/{name}` for instance CRUD.
    fn instance_url(api_url: &Url, name: &str) -> String {
        format!("{}/{}", api_url.as_str().trim_end_matches('/'), name)
    }

    /// `{origin}/{kind}/{name}` for health and port queries.
    fn origin_url(api_url: &Url, kind: &str, name: &str) -> String {
        format!(
            "{}/{}/{}",
            api_url.origin().ascii_serialization(),
            kind,
            name
        )
    }

    /// Build an instance view from the control plane's JSON representation.
    pub fn instance_from_json(service: ServiceId, value: Value) -> Result<Instance> {
        let Value::Object(mut fields) = value else {
            return Err(ControlPlaneError::Decode("instance is not an object".into()).into());
        };
        let name = take_string(&mut fields, "name")
            .ok_or_else(|| ControlPlaneError::Decode("instance without name".into()))?;
        let url = take_string(&mut fields, "url").unwrap_or_default();

        Ok(Instance::new(service, name, url)
            .with_state(InstanceState::Ready)
            .with_attributes(fields))
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn transport(err: reqwest::Error) -> ControlPlaneError {
    ControlPlaneError::Transport(err.to_string())
}

/// Handle a JSON response.
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        let body = response
            .json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))?;
        Ok(body)
    } else {
        Err(status_error(response).await.into())
    }
}

async fn status_error(response: Response) -> ControlPlaneError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ControlPlaneError::Status {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl ControlPlane for OscControlPlane {
    async fn get_service_access_token(&self, service: ServiceId) -> Result<ServiceAccessToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }

        debug!(service = %service, "Requesting service access token");
        let response = self
            .with_pat(self.client.post(self.token_url()))
            .json(&serde_json::json!({ "serviceId": service.as_str() }))
            .send()
            .await
            .map_err(|e| ControlPlaneError::TokenRequest(service, e.to_string()))?;

        if !response.status().is_success() {
            let reason = status_error(response).await.to_string();
            return Err(ControlPlaneError::TokenRequest(service, reason).into());
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ControlPlaneError::TokenRequest(service, e.to_string()))?;
        Ok(ServiceAccessToken::new(body.token))
    }

    async fn get_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Option<Instance>> {
        let api_url = self.service_api_url(service).await?;
        let response = Self::with_sat(self.client.get(Self::instance_url(&api_url, name)), token)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value: Value = handle_response(response).await?;
        Self::instance_from_json(service, value).map(Some)
    }

    async fn create_instance(
        &self,
        service: ServiceId,
        token: &ServiceAccessToken,
        config: &Map<String, Value>,
    ) -> Result<Option<Instance>> {
        let api_url = self.service_api_url(service).await?;
        debug!(service = %service, "Creating instance");
        let response = Self::with_sat(self.client.post(api_url.as_str()), token)
            .json(config)
            .send()
            .await
            .map_err(transport)?;

        if let Some(err) = create_conflict(response.status(), service, config) {
            return Err(err);
        }
        let value: Value = handle_response(response).await?;
        if value.is_null() {
            return Ok(None);
        }
        Self::instance_from_json(service, value).map(Some)
    }

    async fn get_instance_health(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct HealthResponse {
            #[serde(alias = "healthStatus")]
            status: Option<String>,
        }

        let api_url = self.service_api_url(service).await?;
        let response = Self::with_sat(
            self.client.get(Self::origin_url(&api_url, "health", name)),
            token,
        )
        .send()
        .await
        .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let health: HealthResponse = handle_response(response).await?;
        Ok(health.status)
    }

    async fn get_ports_for_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<Vec<InstancePort>> {
        let api_url = self.service_api_url(service).await?;
        let response = Self::with_sat(
            self.client.get(Self::origin_url(&api_url, "ports", name)),
            token,
        )
        .send()
        .await
        .map_err(transport)?;
        handle_response(response).await
    }

    async fn remove_instance(
        &self,
        service: ServiceId,
        name: &str,
        token: &ServiceAccessToken,
    ) -> Result<()> {
        let api_url = self.service_api_url(service).await?;
        debug!(service = %service, instance = %name, "Removing instance");
        let response =
            Self::with_sat(self.client.delete(Self::instance_url(&api_url, name)), token)
                .send()
                .await
                .map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ControlPlaneError::InstanceNotFound(name.to_string()).into()),
            status if status.is_success() => Ok(()),
            _ => Err(status_error(response).await.into()),
        }
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let response = self
            .with_pat(self.client.get(self.subscriptions_url()))
            .send()
            .await
            .map_err(transport)?;
        handle_response(response).await
    }
}

#[async_trait]
impl TranscodeClient for OscControlPlane {
    async fn submit_job(
        &self,
        jobs_url: &str,
        token: &ServiceAccessToken,
        job: &TranscodeJob,
    ) -> Result<SubmittedJob> {
        debug!(jobs_url = %jobs_url, external_id = %job.external_id, "Submitting transcode job");
        let response = Self::with_sat(self.client.post(jobs_url), token)
            .json(job)
            .send()
            .await
            .map_err(transport)?;
        handle_response(response).await
    }
}

/// A create rejected because an instance with the requested name exists.
fn create_conflict(
    status: StatusCode,
    service: ServiceId,
    config: &Map<String, Value>,
) -> Option<OscError> {
    (status == StatusCode::CONFLICT).then(|| OscError::Duplicate {
        service,
        name: config
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
