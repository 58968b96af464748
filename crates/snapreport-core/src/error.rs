use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter {0} not found")]
    NotFound(String),
    #[error("parameter store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("snapshot object {container}/{key} not found")]
    NotFound { container: String, key: String },
    #[error("access to snapshot object {container}/{key} denied: {reason}")]
    Access {
        container: String,
        key: String,
        reason: String,
    },
    #[error("materialize snapshot at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("snapshot {} is corrupt or unreadable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Per-query failure. Logged and skipped; never fatal to a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("statement is not read-only")]
    NotReadOnly,
    #[error("query engine error: {0}")]
    Engine(String),
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("create report buffer {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("append to report buffer {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read back report buffer {}: {source}", .path.display())]
    ReadBack {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("target {target} cannot be resolved: {reason}")]
    Unresolvable { target: String, reason: String },
    #[error("target {target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },
    #[error("target {target} reported failure: {reason}")]
    Failed { target: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("envelope is {size} bytes, over the {limit} byte transport limit")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("parse query catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("query catalog is empty")]
    Empty,
    #[error("query name {0} appears more than once")]
    DuplicateName(String),
    #[error("query {0} has no SQL")]
    EmptySql(String),
}

/// Failures that end a run. Everything here is fatal; query failures are
/// deliberately absent.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("resolve configuration {key}: {source}")]
    ConfigResolution {
        key: String,
        #[source]
        source: ParamError,
    },
    #[error("acquire snapshot: {0}")]
    Acquisition(#[from] FetchError),
    #[error("open snapshot: {0}")]
    Open(#[from] OpenError),
    #[error("assemble report: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("dispatch report: {0}")]
    Dispatch(#[from] DispatchError),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ConfigResolution { .. } => "config_resolution",
            PipelineError::Acquisition(_) => "acquisition",
            PipelineError::Open(_) => "open",
            PipelineError::Assembly(_) => "assembly",
            PipelineError::Dispatch(_) => "dispatch",
        }
    }
}
