use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection};
use snapreport_collab::{
    BlobStore, FsBlobStore, InMemoryBlobStore, InMemoryParameterStore, Invoker, RecordingInvoker,
};
use snapreport_core::{
    Envelope, FetchError, InvokeError, PipelineState, QueryCatalog, QueryDefinition, TriggerEvent,
};
use snapreport_report::REPORT_FILE;
use snapreport_runner::{Config, DispatchMode, Pipeline};
use snapreport_sqlite::SqliteEngine;
use tempfile::{tempdir, TempDir};

const TARGET_KEY: &str = "/trello/arn";

fn snapshot_bytes(dir: &Path, rows: &[(&str, &str)]) -> Vec<u8> {
    let path = dir.join("seed.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE acts(type TEXT, author TEXT);").unwrap();
        for (ty, author) in rows {
            conn.execute("INSERT INTO acts(type, author) VALUES (?1, ?2)", params![ty, author])
                .unwrap();
        }
    }
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    bytes
}

struct Fixture {
    _dir: TempDir,
    cfg: Config,
    blobs: Arc<InMemoryBlobStore>,
    invoker: Arc<RecordingInvoker>,
}

impl Fixture {
    fn new(rows: &[(&str, &str)]) -> Self {
        Self::with_invoker(rows, RecordingInvoker::new())
    }

    fn with_invoker(rows: &[(&str, &str)], invoker: RecordingInvoker) -> Self {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();

        let mut cfg = Config::default();
        cfg.scratch.dir = scratch.to_string_lossy().into_owned();

        let blobs = Arc::new(InMemoryBlobStore::new());
        let bytes = snapshot_bytes(dir.path(), rows);
        blobs.put(&cfg.snapshot.container, &cfg.snapshot.object_key, &bytes).unwrap();

        Self {
            _dir: dir,
            cfg,
            blobs,
            invoker: Arc::new(invoker),
        }
    }

    fn pipeline(&self, catalog: QueryCatalog) -> Pipeline {
        self.pipeline_with_params(catalog, Self::target_params())
    }

    fn pipeline_with_params(&self, catalog: QueryCatalog, params: InMemoryParameterStore) -> Pipeline {
        self.pipeline_with(catalog, params, self.blobs.clone(), self.invoker.clone())
    }

    fn pipeline_with(
        &self,
        catalog: QueryCatalog,
        params: InMemoryParameterStore,
        blobs: Arc<dyn BlobStore>,
        invoker: Arc<dyn Invoker>,
    ) -> Pipeline {
        Pipeline::with_collaborators(
            self.cfg.clone(),
            catalog,
            Arc::new(params),
            blobs,
            Arc::new(SqliteEngine),
            invoker,
        )
    }

    fn target_params() -> InMemoryParameterStore {
        InMemoryParameterStore::new().with(TARGET_KEY, "trello-cards")
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.cfg.scratch_dir()).unwrap().count()
    }
}

// Fetches normally, then leaves a directory where the report buffer goes.
struct BlockedReportStore(Arc<InMemoryBlobStore>);

impl BlobStore for BlockedReportStore {
    fn fetch(&self, container: &str, key: &str, dest: &Path) -> Result<(), FetchError> {
        self.0.fetch(container, key, dest)?;
        let area = dest.parent().and_then(Path::parent).unwrap();
        std::fs::create_dir_all(area.join(REPORT_FILE)).unwrap();
        Ok(())
    }

    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), FetchError> {
        self.0.put(container, key, bytes)
    }
}

// Accepts the payload, then swaps the report buffer for a directory so it
// can no longer be removed as a file.
struct StuckReportInvoker {
    scratch: std::path::PathBuf,
    inner: RecordingInvoker,
}

impl Invoker for StuckReportInvoker {
    fn invoke(&self, target: &str, payload: &[u8]) -> Result<(), InvokeError> {
        let areas: Vec<_> = std::fs::read_dir(&self.scratch).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(areas.len(), 1);
        let report = areas[0].join(REPORT_FILE);
        std::fs::remove_file(&report).unwrap();
        std::fs::create_dir(&report).unwrap();
        std::fs::write(report.join("held"), b"x").unwrap();
        self.inner.invoke(target, payload)
    }
}

fn two_query_catalog(second_sql: &str) -> QueryCatalog {
    QueryCatalog {
        queries: vec![
            QueryDefinition::new("by_type", "Things by type", "select type, count(type) from acts group by type"),
            QueryDefinition::new("second", "The second section", second_sql),
        ],
    }
}

fn table_rows(section: &str) -> Vec<Vec<String>> {
    section
        .lines()
        .filter(|l| l.starts_with('|'))
        .skip(1)
        .map(|l| l.trim_matches('|').split('|').map(|c| c.trim().to_string()).collect())
        .collect()
}

#[test]
fn builtin_catalog_runs_to_done_and_dispatches() {
    let fx = Fixture::new(&[("activity", "ann"), ("trigger", "TIBCO Software Inc."), ("activity", "bob")]);
    let outcome = fx.pipeline(QueryCatalog::builtin()).run_once(&TriggerEvent::new("evt-1"), false);

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(
        outcome.trail,
        vec![
            PipelineState::Idle,
            PipelineState::Acquiring,
            PipelineState::Querying,
            PipelineState::Assembling,
            PipelineState::Dispatching,
            PipelineState::Cleanup,
            PipelineState::Done,
        ]
    );
    assert_eq!(outcome.correlation_id.as_str(), "evt-1");
    assert_eq!(outcome.failed_queries(), 0);

    let calls = fx.invoker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "trello-cards");
    let sent = Envelope::from_bytes(&calls[0].1).unwrap();
    assert_eq!(Some(&sent), outcome.envelope.as_ref());
    assert_eq!(sent.event_version, "1.0");
    assert_eq!(sent.event.title, "Weekly stats for Flogo");

    // labels appear once each, in catalog order
    let text = &sent.event.description;
    let mut last = 0;
    for q in QueryCatalog::builtin().iter() {
        let at = text[last..].find(&q.label).map(|i| i + last);
        assert!(at.is_some(), "missing label {}", q.label);
        last = at.unwrap() + q.label.len();
    }
    assert!(text.ends_with("```\n\n"));

    // work area released
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn failing_query_is_isolated_and_run_still_dispatches() {
    let fx = Fixture::new(&[("A", "ann")]);
    let outcome = fx
        .pipeline(two_query_catalog("select frm where nothing"))
        .run_once(&TriggerEvent::new("evt-2"), false);

    assert!(outcome.is_success());
    assert!(outcome.dispatched);
    assert!(!outcome.queries[0].is_failed());
    assert!(outcome.queries[1].is_failed());

    let text = outcome.envelope.as_ref().unwrap().event.description.clone();
    let (first, second) = text.split_at(text.find("The second section").unwrap());
    assert!(first.starts_with("Things by type\n```\n"));
    assert_eq!(table_rows(first), vec![vec!["A".to_string(), "1".to_string()]]);
    // label and empty fence only
    assert_eq!(second, "The second section\n```\n```\n\n");
    assert_eq!(fx.invoker.calls().len(), 1);
}

#[test]
fn every_label_present_even_when_all_queries_fail() {
    let fx = Fixture::new(&[("A", "ann")]);
    let catalog = QueryCatalog {
        queries: vec![
            QueryDefinition::new("a", "First", "select * from missing_table"),
            QueryDefinition::new("b", "Second", "delete from acts"),
            QueryDefinition::new("c", "Third", "not sql at all"),
        ],
    };
    let outcome = fx.pipeline(catalog).run_once(&TriggerEvent::new("evt-3"), false);

    assert!(outcome.is_success());
    assert_eq!(outcome.failed_queries(), 3);
    assert_eq!(
        outcome.envelope.unwrap().event.description,
        "First\n```\n```\n\nSecond\n```\n```\n\nThird\n```\n```\n\n"
    );
}

#[test]
fn acquisition_failure_never_builds_or_sends_an_envelope() {
    let mut fx = Fixture::new(&[("A", "ann")]);
    fx.cfg.snapshot.object_key = "missing.db".to_string();
    let outcome = fx.pipeline(QueryCatalog::builtin()).run_once(&TriggerEvent::new("evt-4"), false);

    assert_eq!(outcome.state(), PipelineState::Failed);
    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("acquisition"));
    assert!(outcome.envelope.is_none());
    assert!(outcome.queries.is_empty());
    assert!(fx.invoker.calls().is_empty());
    assert_eq!(
        &outcome.trail[outcome.trail.len() - 2..],
        &[PipelineState::Cleanup, PipelineState::Failed]
    );
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn dispatch_failure_fails_the_run_after_full_assembly() {
    let fx = Fixture::with_invoker(&[("A", "ann")], RecordingInvoker::failing("board archived"));
    let outcome = fx.pipeline(two_query_catalog("select count(*) as n from acts")).run_once(&TriggerEvent::new("evt-5"), false);

    assert_eq!(outcome.state(), PipelineState::Failed);
    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("dispatch"));
    assert!(!outcome.dispatched);
    assert!(outcome.report_digest.is_some());
    assert_eq!(outcome.queries.len(), 2);
    assert!(outcome.trail.contains(&PipelineState::Dispatching));
    assert_eq!(fx.invoker.calls().len(), 1);
    assert_eq!(fx.scratch_entries(), 0);
    assert!(outcome.into_result().is_err());
}

#[test]
fn missing_target_parameter_fails_before_touching_local_resources() {
    let fx = Fixture::new(&[("A", "ann")]);
    let outcome = fx
        .pipeline_with_params(QueryCatalog::builtin(), InMemoryParameterStore::new())
        .run_once(&TriggerEvent::new("evt-6"), false);

    assert_eq!(outcome.trail, vec![PipelineState::Idle, PipelineState::Failed]);
    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("config_resolution"));
    assert!(outcome.snapshot_digest.is_none());
    assert!(fx.invoker.calls().is_empty());
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn corrupt_snapshot_is_an_open_failure() {
    let fx = Fixture::new(&[]);
    fx.blobs
        .put(
            &fx.cfg.snapshot.container,
            &fx.cfg.snapshot.object_key,
            "plain text, not a database at all. ".repeat(10).as_bytes(),
        )
        .unwrap();
    let outcome = fx.pipeline(QueryCatalog::builtin()).run_once(&TriggerEvent::new("evt-7"), false);

    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("open"));
    assert!(outcome.snapshot_digest.is_some());
    assert!(fx.invoker.calls().is_empty());
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn repeated_runs_produce_identical_descriptions() {
    let fx = Fixture::new(&[("activity", "ann"), ("activity", "ann"), ("trigger", "bob")]);
    let p = fx.pipeline(QueryCatalog::builtin());
    let a = p.run_once(&TriggerEvent::new("evt-8a"), false);
    let b = p.run_once(&TriggerEvent::new("evt-8b"), false);

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.snapshot_digest, b.snapshot_digest);
    assert_eq!(a.report_digest, b.report_digest);
    assert_eq!(
        a.envelope.unwrap().event.description,
        b.envelope.unwrap().event.description
    );
}

#[test]
fn dry_run_builds_envelope_without_sending() {
    let fx = Fixture::new(&[("A", "ann")]);
    let outcome = fx.pipeline(QueryCatalog::builtin()).run_once(&TriggerEvent::new("evt-9"), true);

    assert!(outcome.is_success());
    assert!(outcome.envelope.is_some());
    assert!(!outcome.dispatched);
    assert!(!outcome.trail.contains(&PipelineState::Dispatching));
    assert!(fx.invoker.calls().is_empty());
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn open_wires_filesystem_collaborators_from_config() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let store = FsBlobStore::new(root.join("store"));
    store
        .put("retgits-fdio", "fdiodb.db", &snapshot_bytes(root, &[("A", "ann")]))
        .unwrap();
    std::fs::create_dir_all(root.join("scratch")).unwrap();
    std::fs::write(root.join("params.toml"), "\"/trello/arn\" = \"cards\"\n").unwrap();

    let toml = format!(
        "[snapshot]\nstore_root = {:?}\n\n[scratch]\ndir = {:?}\n\n[dispatch]\nmode = \"outbox\"\noutbox_dir = {:?}\n\n[params]\nfile = {:?}\n",
        root.join("store").to_string_lossy(),
        root.join("scratch").to_string_lossy(),
        root.join("outbox").to_string_lossy(),
        root.join("params.toml").to_string_lossy(),
    );
    let cfg = Config::from_toml_str(&toml).unwrap();
    assert_eq!(cfg.dispatch.mode, DispatchMode::Outbox);

    let outcome = Pipeline::open(cfg).unwrap().run_once(&TriggerEvent::generated(), false);
    assert!(outcome.is_success(), "{:?}", outcome.error);

    let delivered: Vec<_> = std::fs::read_dir(root.join("outbox").join("cards")).unwrap().collect();
    assert_eq!(delivered.len(), 1);
    let bytes = std::fs::read(delivered[0].as_ref().unwrap().path()).unwrap();
    let env = Envelope::from_bytes(&bytes).unwrap();
    assert_eq!(env.event.description, outcome.envelope.unwrap().event.description);
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(parsed["Event"]["Description"].as_str().unwrap().contains("| A "));
}

#[test]
fn report_buffer_failure_is_an_assembly_failure_and_still_cleans_up() {
    let fx = Fixture::new(&[("A", "ann")]);
    let blobs = Arc::new(BlockedReportStore(fx.blobs.clone()));
    let outcome = fx
        .pipeline_with(QueryCatalog::builtin(), Fixture::target_params(), blobs, fx.invoker.clone())
        .run_once(&TriggerEvent::new("evt-10"), false);

    assert_eq!(outcome.state(), PipelineState::Failed);
    assert_eq!(outcome.error.as_ref().map(|e| e.kind()), Some("assembly"));
    assert!(outcome.snapshot_digest.is_some());
    assert!(outcome.envelope.is_none());
    assert!(fx.invoker.calls().is_empty());
    assert_eq!(
        &outcome.trail[outcome.trail.len() - 2..],
        &[PipelineState::Cleanup, PipelineState::Failed]
    );
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn report_buffer_that_cannot_be_deleted_does_not_change_the_outcome() {
    let fx = Fixture::new(&[("A", "ann")]);
    let invoker = Arc::new(StuckReportInvoker {
        scratch: fx.cfg.scratch_dir(),
        inner: RecordingInvoker::new(),
    });
    let outcome = fx
        .pipeline_with(QueryCatalog::builtin(), Fixture::target_params(), fx.blobs.clone(), invoker.clone())
        .run_once(&TriggerEvent::new("evt-11"), false);

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert!(outcome.dispatched);
    assert_eq!(invoker.inner.calls().len(), 1);
    assert_eq!(
        &outcome.trail[outcome.trail.len() - 2..],
        &[PipelineState::Cleanup, PipelineState::Done]
    );
    // the work area removal still takes the stuck buffer with it
    assert_eq!(fx.scratch_entries(), 0);
}

#[test]
fn snapshot_keyed_like_the_report_buffer_is_queried_intact() {
    let mut fx = Fixture::new(&[]);
    fx.cfg.snapshot.object_key = format!("exports/{REPORT_FILE}");
    let bytes = snapshot_bytes(fx._dir.path(), &[("A", "ann"), ("A", "bob")]);
    fx.blobs.put(&fx.cfg.snapshot.container, &fx.cfg.snapshot.object_key, &bytes).unwrap();

    let outcome = fx
        .pipeline(two_query_catalog("select count(*) as n from acts"))
        .run_once(&TriggerEvent::new("evt-12"), false);

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.failed_queries(), 0);
    let text = outcome.envelope.unwrap().event.description;
    let (first, second) = text.split_at(text.find("The second section").unwrap());
    assert_eq!(table_rows(first), vec![vec!["A".to_string(), "2".to_string()]]);
    assert_eq!(table_rows(second), vec![vec!["2".to_string()]]);
    assert_eq!(fx.scratch_entries(), 0);
}
