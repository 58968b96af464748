use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use snapreport_collab::{
    BlobStore, CommandInvoker, EnvParameterStore, FileParameterStore, FsBlobStore, Invoker, OutboxInvoker,
    ParameterStore, QueryEngine,
};
use snapreport_core::{
    CorrelationId, Envelope, FetchError, PipelineError, PipelineState, QueryCatalog, QueryResult, RunId,
    TriggerEvent,
};
use snapreport_report::{ReportAssembler, ReportDocument, WorkArea};
use snapreport_sqlite::SqliteEngine;
use tracing::{error, info, info_span, warn};

use crate::acquirer::SnapshotAcquirer;
use crate::config::{Config, DispatchMode};
use crate::dispatcher::Dispatcher;
use crate::executor::QueryExecutor;
use crate::util::now_unix;

/// Everything known about one finished run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub correlation_id: CorrelationId,
    pub started_at_unix: i64,
    pub elapsed_ms: u128,
    /// Every state entered, starting at `Idle` and ending in `Done` or `Failed`.
    pub trail: Vec<PipelineState>,
    pub queries: Vec<QueryResult>,
    pub snapshot_digest: Option<String>,
    pub report_digest: Option<String>,
    pub envelope: Option<Envelope>,
    pub dispatched: bool,
    pub error: Option<PipelineError>,
}

impl RunOutcome {
    fn new(event: &TriggerEvent) -> Self {
        Self {
            run_id: RunId::new(),
            correlation_id: event.correlation_id(),
            started_at_unix: now_unix(),
            elapsed_ms: 0,
            trail: vec![PipelineState::Idle],
            queries: vec![],
            snapshot_digest: None,
            report_digest: None,
            envelope: None,
            dispatched: false,
            error: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.trail.last().copied().unwrap_or(PipelineState::Idle)
    }

    pub fn is_success(&self) -> bool {
        self.state() == PipelineState::Done
    }

    pub fn failed_queries(&self) -> usize {
        self.queries.iter().filter(|q| q.is_failed()).count()
    }

    /// Hand back the fatal error, if the run had one.
    pub fn into_result(mut self) -> std::result::Result<Self, PipelineError> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    fn enter(&mut self, next: PipelineState) {
        info!(from = %self.state(), to = %next, "state transition");
        self.trail.push(next);
    }
}

/// Drives one run: resolve target, acquire, query, assemble, dispatch,
/// clean up.
pub struct Pipeline {
    pub cfg: Config,
    pub catalog: QueryCatalog,
    pub params: Arc<dyn ParameterStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub engine: Arc<dyn QueryEngine>,
    pub invoker: Arc<dyn Invoker>,
}

impl Pipeline {
    /// Build the pipeline with the collaborators named by `cfg`.
    pub fn open(cfg: Config) -> Result<Self> {
        let catalog = cfg.load_catalog()?;
        let params: Arc<dyn ParameterStore> = match cfg.params_file() {
            Some(path) => Arc::new(FileParameterStore::load_from(&path)?),
            None => Arc::new(EnvParameterStore::default()),
        };
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(cfg.store_root()));
        let invoker: Arc<dyn Invoker> = match cfg.dispatch.mode {
            DispatchMode::Outbox => Arc::new(OutboxInvoker::new(cfg.outbox_dir())),
            DispatchMode::Command => Arc::new(CommandInvoker::new(cfg.dispatch.command_args.clone())),
        };
        Ok(Self {
            cfg,
            catalog,
            params,
            blobs,
            engine: Arc::new(SqliteEngine),
            invoker,
        })
    }

    pub fn with_collaborators(
        cfg: Config,
        catalog: QueryCatalog,
        params: Arc<dyn ParameterStore>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn QueryEngine>,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        Self {
            cfg,
            catalog,
            params,
            blobs,
            engine,
            invoker,
        }
    }

    /// Execute one run for `event`. With `dry_run` the envelope is built
    /// but never sent. The returned outcome always ends in a terminal state.
    pub fn run_once(&self, event: &TriggerEvent, dry_run: bool) -> RunOutcome {
        let started = Instant::now();
        let mut run = RunOutcome::new(event);
        let span = info_span!(
            "run",
            run_id = %run.run_id,
            correlation_id = %run.correlation_id,
            region = %self.cfg.deployment.region,
        );
        let _guard = span.enter();
        info!(queries = self.catalog.len(), dry_run, "processing trigger event");

        // Resolve before any local resource exists, so this failure needs no cleanup.
        let key = &self.cfg.dispatch.target_param;
        let target = match self.params.get(key, true) {
            Ok(t) => {
                info!(key = %key, value = "<redacted>", "downstream target resolved");
                t
            }
            Err(source) => {
                let err = PipelineError::ConfigResolution { key: key.clone(), source };
                return self.finish(run, Some(err), started);
            }
        };

        run.enter(PipelineState::Acquiring);
        let scratch = self.cfg.scratch_dir();
        let area = match WorkArea::create(&scratch, &run.run_id) {
            Ok(a) => a,
            Err(source) => {
                let err = PipelineError::Acquisition(FetchError::Io { path: scratch, source });
                return self.finish(run, Some(err), started);
            }
        };

        let mut report = None;
        let result = self.stages(&mut run, &area, &target, dry_run, &mut report);

        run.enter(PipelineState::Cleanup);
        if let Some(doc) = &report {
            if let Err(e) = doc.release() {
                warn!(path = %doc.path.display(), error = %e, "could not delete report buffer");
            }
        }
        let area_path = area.path().to_path_buf();
        if let Err(e) = area.release() {
            warn!(path = %area_path.display(), error = %e, "could not delete work area");
        }

        self.finish(run, result.err(), started)
    }

    fn stages(
        &self,
        run: &mut RunOutcome,
        area: &WorkArea,
        target: &str,
        dry_run: bool,
        report: &mut Option<ReportDocument>,
    ) -> std::result::Result<(), PipelineError> {
        let snapshot = SnapshotAcquirer::new(
            self.blobs.as_ref(),
            &self.cfg.snapshot.container,
            &self.cfg.snapshot.object_key,
        )
        .acquire(area)?;
        let digest = snapshot.digest()?;
        info!(container = %snapshot.container, key = %snapshot.key, sha256 = %digest, "snapshot ready");
        run.snapshot_digest = Some(digest);

        run.enter(PipelineState::Querying);
        let mut assembler = ReportAssembler::create(&area.report_file())?;
        let executor = QueryExecutor::new(self.engine.as_ref(), self.cfg.render_options());
        run.queries = executor.execute(&snapshot, &self.catalog, &mut assembler)?;

        run.enter(PipelineState::Assembling);
        let doc = assembler.finalize()?;
        run.report_digest = Some(doc.digest());

        let dispatcher = Dispatcher::new(
            self.invoker.as_ref(),
            &self.cfg.dispatch.event_source,
            &self.cfg.report.title,
            self.cfg.dispatch.max_payload_bytes,
        );
        let envelope = dispatcher.envelope(&doc.text);
        *report = Some(doc);
        run.envelope = Some(envelope.clone());

        if dry_run {
            info!("dry run; envelope built but not sent");
            return Ok(());
        }

        run.enter(PipelineState::Dispatching);
        dispatcher.dispatch(target, &envelope)?;
        run.dispatched = true;
        Ok(())
    }

    fn finish(&self, mut run: RunOutcome, err: Option<PipelineError>, started: Instant) -> RunOutcome {
        run.elapsed_ms = started.elapsed().as_millis();
        match &err {
            Some(e) => {
                run.enter(PipelineState::Failed);
                error!(kind = e.kind(), error = %e, elapsed_ms = run.elapsed_ms, "run failed");
            }
            None => {
                run.enter(PipelineState::Done);
                info!(
                    failed_queries = run.failed_queries(),
                    dispatched = run.dispatched,
                    elapsed_ms = run.elapsed_ms,
                    "run complete"
                );
            }
        }
        run.error = err;
        run
    }
}
