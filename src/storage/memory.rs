//! In-memory [`ArtifactStore`] with fault injection, used by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::{ArtifactStore, ObjectSummary};
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct Faults {
    put: HashSet<String>,
    head: HashSet<String>,
    get: HashSet<String>,
    delete: HashSet<String>,
    list: bool,
}

pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    puts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    clock: Mutex<DateTime<Utc>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(operation: &'static str, key: &str) -> StoreError {
    StoreError::Request {
        operation,
        key: key.to_string(),
        message: "injected failure".to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            clock: Mutex::new(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    /// Seeds an object with an explicit modification time. Not recorded as a put.
    pub fn seed(
        &self,
        key: &str,
        body: &[u8],
        metadata: HashMap<String, String>,
        last_modified: DateTime<Utc>,
    ) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                metadata,
                last_modified,
            },
        );
        let mut clock = self.clock.lock().unwrap();
        if last_modified > *clock {
            *clock = last_modified;
        }
    }

    pub fn fail_put(&self, key: &str) {
        self.faults.lock().unwrap().put.insert(key.to_string());
    }

    pub fn fail_head(&self, key: &str) {
        self.faults.lock().unwrap().head.insert(key.to_string());
    }

    pub fn fail_get(&self, key: &str) {
        self.faults.lock().unwrap().get.insert(key.to_string());
    }

    pub fn fail_delete(&self, key: &str) {
        self.faults.lock().unwrap().delete.insert(key.to_string());
    }

    pub fn fail_list(&self) {
        self.faults.lock().unwrap().list = true;
    }

    /// Keys written through [`ArtifactStore::put`], in call order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    fn tick(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock().unwrap();
        *clock += Duration::seconds(1);
        *clock
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if self.faults.lock().unwrap().put.contains(key) {
            return Err(injected("put", key));
        }
        let last_modified = self.tick();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                metadata: metadata.clone(),
                last_modified,
            },
        );
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn head_metadata(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        if self.faults.lock().unwrap().head.contains(key) {
            return Err(injected("head", key));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.metadata.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.faults.lock().unwrap().get.contains(key) {
            return Err(injected("get", key));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>, StoreError> {
        if self.faults.lock().unwrap().list {
            return Err(injected("list", prefix));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, o)| ObjectSummary {
                key: key.clone(),
                last_modified: o.last_modified,
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.faults.lock().unwrap().delete.contains(key) {
            return Err(injected("delete", key));
        }
        self.objects.lock().unwrap().remove(key);
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
