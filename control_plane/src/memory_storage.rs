//! In-memory object storage keyed by endpoint.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use control_plane_interface::{ObjectStorage, ObjectSummary, StorageConnector, StorageError};
use osc_shared_types::{OscError, Result, StorageCredentials};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// One storage endpoint's buckets.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    buckets: Mutex<Buckets>,
}

impl InMemoryStorage {
    fn lock(&self) -> Result<MutexGuard<'_, Buckets>> {
        self.buckets
            .lock()
            .map_err(|_| OscError::storage("in-memory storage lock poisoned"))
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .ok()
            .and_then(|b| b.get(bucket).and_then(|objects| objects.get(key).cloned()))
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.lock()?.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let mut buckets = self.lock()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let buckets = self.lock()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        Ok(objects
            .iter()
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }
}

/// Hands out one [`InMemoryStorage`] per endpoint and remembers every
/// credential set it was asked to connect with.
#[derive(Debug, Default)]
pub struct InMemoryConnector {
    endpoints: Mutex<HashMap<String, Arc<InMemoryStorage>>>,
    connections: Mutex<Vec<StorageCredentials>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage behind `endpoint`, if anything connected to it.
    pub fn storage(&self, endpoint: &str) -> Option<Arc<InMemoryStorage>> {
        self.endpoints
            .lock()
            .ok()
            .and_then(|e| e.get(endpoint.trim_end_matches('/')).cloned())
    }

    pub fn connections(&self) -> Vec<StorageCredentials> {
        self.connections
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl StorageConnector for InMemoryConnector {
    fn connect(&self, credentials: &StorageCredentials) -> Result<Arc<dyn ObjectStorage>> {
        if credentials.endpoint.is_empty() {
            return Err(StorageError::InvalidEndpoint("empty endpoint".into()).into());
        }
        self.connections
            .lock()
            .map_err(|_| OscError::storage("connector lock poisoned"))?
            .push(credentials.clone());

        let mut endpoints = self
            .endpoints
            .lock()
            .map_err(|_| OscError::storage("connector lock poisoned"))?;
        let storage = endpoints
            .entry(credentials.endpoint.trim_end_matches('/').to_string())
            .or_default()
            .clone();
        Ok(storage)
    }
}
