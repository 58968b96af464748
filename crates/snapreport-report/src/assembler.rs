use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use snapreport_core::{sha256_hex, AssemblyError};
use tracing::debug;

/// Builds the report by appending text, in call order, to a file.
pub struct ReportAssembler {
    path: PathBuf,
    out: BufWriter<File>,
    appends: usize,
}

impl ReportAssembler {
    /// Create (or truncate) the backing file at `path`.
    pub fn create(path: &Path) -> Result<Self, AssemblyError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|source| AssemblyError::Create {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            appends: 0,
        })
    }

    pub fn append(&mut self, text: &str) -> Result<(), AssemblyError> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|source| AssemblyError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.appends += 1;
        Ok(())
    }

    pub fn appends(&self) -> usize {
        self.appends
    }

    /// Close the file for writing and read the full text back.
    pub fn finalize(self) -> Result<ReportDocument, AssemblyError> {
        let Self { path, out, appends } = self;
        let file = out.into_inner().map_err(|e| AssemblyError::Write {
            path: path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| AssemblyError::Write {
            path: path.clone(),
            source,
        })?;
        drop(file);

        let text = std::fs::read_to_string(&path).map_err(|source| AssemblyError::ReadBack {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), appends, bytes = text.len(), "report finalized");
        Ok(ReportDocument { path, text })
    }
}

/// The finished report: its backing file and its full text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportDocument {
    pub path: PathBuf,
    pub text: String,
}

impl ReportDocument {
    pub fn digest(&self) -> String {
        sha256_hex(self.text.as_bytes())
    }

    /// Delete the backing file. The text stays usable.
    pub fn release(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
