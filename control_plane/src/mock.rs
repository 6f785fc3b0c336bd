//! Mock control plane for testing and development.
//!
//! Instances live in memory; health progressions, failures and ports can be
//! scripted per service, and every call is recorded for later assertions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use control_plane_interface::{
    ControlPlane, ControlPlaneError, ServiceAccessToken, SubmittedJob, TranscodeClient,
    TranscodeJob,
};
use osc_shared_types::{
    Instance, InstancePort, InstanceState, OscError, Result, ServiceId, Subscription,
};

/// Address reported for every mocked external port.
pub const MOCK_EXTERNAL_IP: &str = "172.232.131.169";

/// A call observed by [`MockControlPlane`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Token(ServiceId),
    Get(ServiceId, String),
    Create(ServiceId, String),
    Health(ServiceId, String),
    Ports(ServiceId, String),
    Remove(ServiceId, String),
    ListSubscriptions,
}

type InstanceKey = (ServiceId, String);

#[derive(Default)]
struct Behaviour {
    /// Health statuses returned in order per service; "running" once exhausted.
    health_scripts: HashMap<ServiceId, VecDeque<Option<String>>>,
    /// Status returned forever once the script is exhausted, if set.
    stuck_health: HashMap<ServiceId, Option<String>>,
    failing_tokens: HashSet<ServiceId>,
    failing_creates: HashSet<ServiceId>,
    empty_creates: HashSet<ServiceId>,
    failing_removes: HashSet<ServiceId>,
    ports: HashMap<InstanceKey, Vec<InstancePort>>,
    subscriptions: Vec<Subscription>,
}

/// Mock control plane that simulates the remote service catalog in-memory.
pub struct MockControlPlane {
    instances: Arc<RwLock<HashMap<InstanceKey, Instance>>>,
    behaviour: Arc<RwLock<Behaviour>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
    next_port: Arc<Mutex<u16>>,
}

impl std::fmt::Debug for MockControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockControlPlane")
            .field("instances", &self.instances)
            .field("calls", &self.calls)
            .finish()
    }
}

impl Default for MockControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            behaviour: Arc::new(RwLock::new(Behaviour::default())),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_port: Arc::new(Mutex::new(10500)),
        }
    }

    /// URL a created instance is reachable at.
    pub fn instance_url(service: ServiceId, name: &str) -> String {
        format!("https://demo-{}.{}.auto.prod.osaas.io", name, service)
    }

    /// Seed an existing instance (for testing).
    pub async fn insert_instance(&self, instance: Instance) {
        info!(
            "MockControlPlane: Inserting instance {} ({})",
            instance.name, instance.service_id
        );
        self.instances
            .write()
            .await
            .insert((instance.service_id, instance.name.clone()), instance);
    }

    /// Health statuses reported by the next health checks of `service`.
    pub async fn script_health(&self, service: ServiceId, statuses: &[Option<&str>]) {
        let script = statuses.iter().map(|s| s.map(str::to_string)).collect();
        self.behaviour
            .write()
            .await
            .health_scripts
            .insert(service, script);
    }

    /// Keep reporting `status` for `service` once any script is exhausted.
    pub async fn stick_health(&self, service: ServiceId, status: Option<&str>) {
        self.behaviour
            .write()
            .await
            .stuck_health
            .insert(service, status.map(str::to_string));
    }

    pub async fn fail_tokens_for(&self, service: ServiceId) {
        self.behaviour.write().await.failing_tokens.insert(service);
    }

    pub async fn fail_creates_for(&self, service: ServiceId) {
        self.behaviour.write().await.failing_creates.insert(service);
    }

    /// Accept create calls for `service` but return no instance.
    pub async fn return_nothing_on_create_for(&self, service: ServiceId) {
        self.behaviour.write().await.empty_creates.insert(service);
    }

    pub async fn fail_removes_for(&self, service: ServiceId) {
        self.behaviour.write().await.failing_removes.insert(service);
    }

    pub async fn set_ports(&self, service: ServiceId, name: &str, ports: Vec<InstancePort>) {
        self.behaviour
            .write()
            .await
            .ports
            .insert((service, name.to_string()), ports);
    }

    pub async fn set_subscriptions(&self, subscriptions: Vec<Subscription>) {
        self.behaviour.write().await.subscriptions = subscriptions;
    }

    /// Get an instance without recording a call (for testing).
    pub async fn instance(&self, service: ServiceId, name: &str) -> Option<Instance> {
        self.instances
            .read()
            .await
            .get(&(service, name.to_string()))
            .cloned()
    }

    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub async fn count_calls(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| predicate(c)).count()
    }

    pub async fn create_calls(&self, service: ServiceId) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Create(s, _) if *s == service))
            .await
    }

    pub async fn health_calls(&self, service: ServiceId) -> usize {
        self.count_calls(|c| matches!(c, MockCall::Health(s, _) if *s == service))
            .await
    }

    async fn record(&self, call: MockCall) {
        self.calls.write().await.push(call);
    }

    /// Default port mapping for a freshly created instance.
    async fn allocate_ports(&self, service: ServiceId) -> Vec<InstancePort> {
        if service != ServiceId::VALKEY {
            return Vec::new();
        }
        let mut next = self.next_port.lock().await;
        *next += 1;
        vec![InstancePort {
            internal_port: 6379,
            external_ip: MOCK_EXTERNAL_IP.to_string(),
            external_port: *next,
        }]
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn get_service_access_token(&self, service: ServiceId) -> Result<ServiceAccessToken> {
        self.record(MockCall::Token(service)).await;
        if self.behaviour.read().await.failing_tokens.contains(&service) {
            return Err(ControlPlaneError::TokenRequest(service, "401 Unauthorized".into()).into());
        }
        Ok(ServiceAccessToken::new(format!("sat-{}", service)))
    }

    async fn get_instance(
        &self,
        service: ServiceId,
        name: &str,
        _token: &ServiceAccessToken,
    ) -> Result<Option<Instance>> {
        debug!("MockControlPlane: Getting instance {} ({})", name, service);
        self.record(MockCall::Get(service, name.to_string())).await;
        Ok(self.instance(service, name).await)
    }

    async fn create_instance(
        &self,
        service: ServiceId,
        _token: &ServiceAccessToken,
        config: &Map<String, Value>,
    ) -> Result<Option<Instance>> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| OscError::remote("create request without name"))?
            .to_string();
        info!("MockControlPlane: Creating instance {} ({})", name, service);
        self.record(MockCall::Create(service, name.clone())).await;

        {
            let behaviour = self.behaviour.read().await;
            if behaviour.failing_creates.contains(&service) {
                return Err(ControlPlaneError::Status {
                    status: 500,
                    body: "Internal Server Error".into(),
                }
                .into());
            }
            if behaviour.empty_creates.contains(&service) {
                return Ok(None);
            }
        }

        let key = (service, name.clone());
        if self.instances.read().await.contains_key(&key) {
            return Err(OscError::Duplicate { service, name });
        }

        let mut attributes = config.clone();
        attributes.remove("name");
        let instance = Instance::new(service, name.clone(), Self::instance_url(service, &name))
            .with_state(InstanceState::Provisioning)
            .with_attributes(attributes);

        let ports = self.allocate_ports(service).await;
        {
            let mut behaviour = self.behaviour.write().await;
            behaviour.ports.entry(key.clone()).or_insert(ports);
        }
        self.instances.write().await.insert(key, instance.clone());
        Ok(Some(instance))
    }

    async fn get_instance_health(
        &self,
        service: ServiceId,
        name: &str,
        _token: &ServiceAccessToken,
    ) -> Result<Option<String>> {
        self.record(MockCall::Health(service, name.to_string())).await;
        if self.instance(service, name).await.is_none() {
            return Ok(None);
        }

        let mut behaviour = self.behaviour.write().await;
        if let Some(status) = behaviour
            .health_scripts
            .get_mut(&service)
            .and_then(VecDeque::pop_front)
        {
            return Ok(status);
        }
        match behaviour.stuck_health.get(&service) {
            Some(status) => Ok(status.clone()),
            None => Ok(Some(InstanceState::RUNNING.to_string())),
        }
    }

    async fn get_ports_for_instance(
        &self,
        service: ServiceId,
        name: &str,
        _token: &ServiceAccessToken,
    ) -> Result<Vec<InstancePort>> {
        self.record(MockCall::Ports(service, name.to_string())).await;
        Ok(self
            .behaviour
            .read()
            .await
            .ports
            .get(&(service, name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_instance(
        &self,
        service: ServiceId,
        name: &str,
        _token: &ServiceAccessToken,
    ) -> Result<()> {
        info!("MockControlPlane: Removing instance {} ({})", name, service);
        self.record(MockCall::Remove(service, name.to_string())).await;
        if self.behaviour.read().await.failing_removes.contains(&service) {
            return Err(ControlPlaneError::Status {
                status: 503,
                body: "Service Unavailable".into(),
            }
            .into());
        }

        match self
            .instances
            .write()
            .await
            .remove(&(service, name.to_string()))
        {
            Some(_) => Ok(()),
            None => Err(ControlPlaneError::InstanceNotFound(name.to_string()).into()),
        }
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.record(MockCall::ListSubscriptions).await;
        Ok(self.behaviour.read().await.subscriptions.clone())
    }
}

/// Transcode client that records submitted jobs instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingTranscoder {
    jobs: Mutex<Vec<(String, TranscodeJob)>>,
    fail: RwLock<bool>,
}

impl RecordingTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_submissions(&self) {
        *self.fail.write().await = true;
    }

    /// Submitted `(jobs_url, job)` pairs in submission order.
    pub async fn jobs(&self) -> Vec<(String, TranscodeJob)> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl TranscodeClient for RecordingTranscoder {
    async fn submit_job(
        &self,
        jobs_url: &str,
        _token: &ServiceAccessToken,
        job: &TranscodeJob,
    ) -> Result<SubmittedJob> {
        if *self.fail.read().await {
            return Err(ControlPlaneError::Status {
                status: 400,
                body: "Bad Request".into(),
            }
            .into());
        }
        let mut jobs = self.jobs.lock().await;
        jobs.push((jobs_url.to_string(), job.clone()));
        Ok(SubmittedJob {
            id: format!("job-{}", jobs.len()),
            status: Some("NEW".to_string()),
        })
    }
}
