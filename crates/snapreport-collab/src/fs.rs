use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use snapreport_core::{FetchError, InvokeError, ParamError};
use tracing::debug;
use uuid::Uuid;

use crate::traits::{BlobStore, Invoker, ParameterStore};

/// Blob store laid out on disk as `<root>/<container>/<key>`.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    pub root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, container: &str, key: &str) -> PathBuf {
        self.root.join(container).join(key)
    }

    fn map_io(container: &str, key: &str, path: &Path, source: std::io::Error) -> FetchError {
        match source.kind() {
            ErrorKind::NotFound => FetchError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            ErrorKind::PermissionDenied => FetchError::Access {
                container: container.to_string(),
                key: key.to_string(),
                reason: source.to_string(),
            },
            _ => FetchError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

impl BlobStore for FsBlobStore {
    fn fetch(&self, container: &str, key: &str, dest: &Path) -> Result<(), FetchError> {
        let src = self.object_path(container, key);
        let bytes = std::fs::read(&src).map_err(|e| Self::map_io(container, key, &src, e))?;
        std::fs::write(dest, &bytes).map_err(|source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        debug!(src = %src.display(), dest = %dest.display(), bytes = bytes.len(), "fetched snapshot object");
        Ok(())
    }

    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), FetchError> {
        let path = self.object_path(container, key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::map_io(container, key, parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| Self::map_io(container, key, &path, e))
    }
}

/// Parameters loaded once from a flat TOML table of `"key" = "value"`.
#[derive(Clone, Debug, Default)]
pub struct FileParameterStore {
    values: HashMap<String, String>,
}

impl FileParameterStore {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let values: HashMap<String, String> = toml::from_str(s)?;
        Ok(Self { values })
    }
}

impl ParameterStore for FileParameterStore {
    fn get(&self, key: &str, _secret: bool) -> Result<String, ParamError> {
        self.values.get(key).cloned().ok_or_else(|| ParamError::NotFound(key.to_string()))
    }
}

/// Delivers payloads by dropping them into `<root>/<target>/`. A consumer
/// watching that directory picks them up.
#[derive(Clone, Debug)]
pub struct OutboxInvoker {
    pub root: PathBuf,
}

impl OutboxInvoker {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn target_dir(&self, target: &str) -> Result<PathBuf, InvokeError> {
        let valid = !target.is_empty()
            && target != "."
            && target != ".."
            && !target.contains(['/', '\\']);
        if !valid {
            return Err(InvokeError::Unresolvable {
                target: target.to_string(),
                reason: "outbox targets must be a single path segment".to_string(),
            });
        }
        Ok(self.root.join(target))
    }
}

impl Invoker for OutboxInvoker {
    fn invoke(&self, target: &str, payload: &[u8]) -> Result<(), InvokeError> {
        let dir = self.target_dir(target)?;
        let unreachable = |e: std::io::Error| InvokeError::Unreachable {
            target: target.to_string(),
            reason: e.to_string(),
        };
        std::fs::create_dir_all(&dir).map_err(unreachable)?;

        // Write under a temp name so a watcher never sees a partial payload.
        let id = Uuid::new_v4();
        let tmp = dir.join(format!(".{id}.json.tmp"));
        let dest = dir.join(format!("{id}.json"));
        std::fs::write(&tmp, payload).map_err(unreachable)?;
        std::fs::rename(&tmp, &dest).map_err(|e| InvokeError::Failed {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
        debug!(dest = %dest.display(), bytes = payload.len(), "payload delivered to outbox");
        Ok(())
    }
}
