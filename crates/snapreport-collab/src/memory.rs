use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use snapreport_core::{FetchError, InvokeError, ParamError};

use crate::traits::{BlobStore, Invoker, ParameterStore};

/// In-memory parameters for tests and local runs.
#[derive(Default)]
pub struct InMemoryParameterStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.into(), value.into());
    }
}

impl ParameterStore for InMemoryParameterStore {
    fn get(&self, key: &str, _secret: bool) -> Result<String, ParamError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned().ok_or_else(|| ParamError::NotFound(key.to_string()))
    }
}

/// In-memory blob store. Not durable, but good for unit/small pipeline tests.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn fetch(&self, container: &str, key: &str, dest: &Path) -> Result<(), FetchError> {
        let bytes = {
            let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
            objects
                .get(&(container.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| FetchError::NotFound {
                    container: container.to_string(),
                    key: key.to_string(),
                })?
        };
        std::fs::write(dest, bytes).map_err(|source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }

    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), FetchError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert((container.to_string(), key.to_string()), bytes.to_vec());
        Ok(())
    }
}

/// Records every invocation; optionally rejects them all.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<(String, Vec<u8>)>>,
    fail_with: Option<String>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// An invoker whose target always reports `reason` as a failure.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            calls: Mutex::new(vec![]),
            fail_with: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<u8>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Invoker for RecordingInvoker {
    fn invoke(&self, target: &str, payload: &[u8]) -> Result<(), InvokeError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target.to_string(), payload.to_vec()));
        match &self.fail_with {
            Some(reason) => Err(InvokeError::Failed {
                target: target.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}
