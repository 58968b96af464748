use std::path::{Path, PathBuf};

use snapreport_collab::BlobStore;
use snapreport_core::{sha256_hex, FetchError};
use snapreport_report::WorkArea;
use tracing::info;

/// A snapshot fetched into the run's work area.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub container: String,
    pub key: String,
    pub local_path: PathBuf,
}

impl Snapshot {
    pub fn digest(&self) -> Result<String, FetchError> {
        let bytes = std::fs::read(&self.local_path).map_err(|source| FetchError::Io {
            path: self.local_path.clone(),
            source,
        })?;
        Ok(sha256_hex(&bytes))
    }
}

/// Fetches the latest snapshot. No retries: a failed fetch ends the run.
pub struct SnapshotAcquirer<'a> {
    store: &'a dyn BlobStore,
    container: &'a str,
    key: &'a str,
}

impl<'a> SnapshotAcquirer<'a> {
    pub fn new(store: &'a dyn BlobStore, container: &'a str, key: &'a str) -> Self {
        Self { store, container, key }
    }

    pub fn acquire(&self, area: &WorkArea) -> Result<Snapshot, FetchError> {
        let local_path = area.snapshot_file(local_name(self.key));
        self.store.fetch(self.container, self.key, &local_path)?;
        info!(container = self.container, key = self.key, path = %local_path.display(), "snapshot acquired");
        Ok(Snapshot {
            container: self.container.to_string(),
            key: self.key.to_string(),
            local_path,
        })
    }
}

// Last segment of the object key, so `exports/fdiodb.db` lands as `fdiodb.db`.
fn local_name(key: &str) -> &str {
    Path::new(key)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot.db")
}
