use std::path::{Path, PathBuf};

use snapreport_core::RunId;
use tracing::debug;

/// Report buffer, at the top of the work area.
pub const REPORT_FILE: &str = "report.txt";
// Fetched snapshots live one level down so no object key can land on the
// report buffer.
const SNAPSHOT_DIR: &str = "snapshot";

/// Per-run directory under the scratch dir. Holds the fetched snapshot and
/// the report buffer; nothing in it outlives the run once released.
#[derive(Debug)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn create(scratch_dir: &Path, run_id: &RunId) -> std::io::Result<Self> {
        let root = scratch_dir.join(format!("snapreport-{}", run_id.as_str()));
        std::fs::create_dir_all(root.join(SNAPSHOT_DIR))?;
        debug!(root = %root.display(), "work area created");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where a snapshot named `name` is materialized.
    pub fn snapshot_file(&self, name: &str) -> PathBuf {
        self.root.join(SNAPSHOT_DIR).join(name)
    }

    pub fn report_file(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    /// Remove the work area and everything in it.
    pub fn release(self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
