use snapreport_collab::QueryEngine;
use snapreport_core::{PipelineError, QueryCatalog, QueryResult, QueryStatus, RenderOptions};
use snapreport_report::ReportAssembler;
use tracing::{info, warn};

use crate::acquirer::Snapshot;

/// Closes every section, whether or not its query produced output.
pub const SECTION_CLOSE: &str = "```\n\n";

/// Narrative that opens a section: the label, then a code fence for the table.
pub fn section_open(label: &str) -> String {
    format!("{label}\n```\n")
}

/// Runs the catalog in order against an opened snapshot, feeding the
/// assembler as it goes.
pub struct QueryExecutor<'a> {
    engine: &'a dyn QueryEngine,
    opts: RenderOptions,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(engine: &'a dyn QueryEngine, opts: RenderOptions) -> Self {
        Self { engine, opts }
    }

    /// Open failures and assembler failures end the run. A failing query
    /// only loses its own table; its label and fence are still written and
    /// the next query runs.
    pub fn execute(
        &self,
        snapshot: &Snapshot,
        catalog: &QueryCatalog,
        report: &mut ReportAssembler,
    ) -> Result<Vec<QueryResult>, PipelineError> {
        let resource = self.engine.open(&snapshot.local_path)?;
        let mut results = Vec::with_capacity(catalog.len());

        for q in catalog.iter() {
            report.append(&section_open(&q.label))?;
            let status = match resource.run(&q.sql, self.opts) {
                Ok(block) => {
                    report.append(&block)?;
                    info!(query = %q.name, bytes = block.len(), "query rendered");
                    QueryStatus::Rendered { bytes: block.len() }
                }
                Err(e) => {
                    warn!(query = %q.name, sql = %q.sql, error = %e, "query failed; continuing");
                    QueryStatus::Failed { error: e.to_string() }
                }
            };
            report.append(SECTION_CLOSE)?;
            results.push(QueryResult {
                name: q.name.clone(),
                status,
            });
        }
        Ok(results)
    }
}
