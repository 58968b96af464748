use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::CorrelationId;

/// One entry of the ordered query list: the narrative shown before the
/// results and the read-only SQL that produces them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDefinition {
    pub name: String,
    pub label: String,
    pub sql: String,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            sql: sql.into(),
        }
    }
}

/// Text formatting knobs for a rendered result set. These never change
/// which rows a query returns.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderOptions {
    pub merge_cells: bool,
    pub row_separator: bool,
    pub render_as_table: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            merge_cells: true,
            row_separator: true,
            render_as_table: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Querying,
    Assembling,
    Dispatching,
    Cleanup,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Acquiring => "acquiring",
            PipelineState::Querying => "querying",
            PipelineState::Assembling => "assembling",
            PipelineState::Dispatching => "dispatching",
            PipelineState::Cleanup => "cleanup",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scheduler event that starts one run. Only `id` is interpreted;
/// everything else is carried along untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TriggerEvent {
    pub id: String,
    #[serde(flatten)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

impl TriggerEvent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            detail: BTreeMap::new(),
        }
    }

    /// Event with a freshly generated id, for runs started by hand.
    pub fn generated() -> Self {
        Self::new(CorrelationId::new().0)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_str(self.id.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryStatus {
    Rendered { bytes: usize },
    Failed { error: String },
}

/// What happened to one QueryDefinition during a run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub name: String,
    pub status: QueryStatus,
}

impl QueryResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, QueryStatus::Failed { .. })
    }
}
