use std::path::Path;

use snapreport_core::{FetchError, InvokeError, OpenError, ParamError, QueryError, RenderOptions};

/// Key-value configuration and secrets lookup.
pub trait ParameterStore: Send + Sync {
    /// `secret` marks values that must never be logged.
    fn get(&self, key: &str, secret: bool) -> Result<String, ParamError>;
}

/// Remote blob storage holding snapshots.
pub trait BlobStore: Send + Sync {
    /// Copy `container/key` to `dest`, overwriting whatever is there.
    fn fetch(&self, container: &str, key: &str, dest: &Path) -> Result<(), FetchError>;
    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), FetchError>;
}

/// A tabular data engine able to open a fetched snapshot.
pub trait QueryEngine: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn QueryableResource>, OpenError>;
}

/// An opened snapshot. Dropping it releases the underlying handle.
pub trait QueryableResource {
    /// Execute `sql` and return the result set already rendered as text.
    fn run(&self, sql: &str, opts: RenderOptions) -> Result<String, QueryError>;
}

/// Invoke-by-name delivery to a downstream consumer. Blocks until the
/// target has accepted or rejected the payload.
pub trait Invoker: Send + Sync {
    fn invoke(&self, target: &str, payload: &[u8]) -> Result<(), InvokeError>;
}
