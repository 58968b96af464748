//! Wire object handed to the downstream target.
//!
//! Field names are PascalCase on the wire:
//! `{"EventVersion": "...", "EventSource": "...", "Event": {"Title": "...", "Description": "..."}}`.

use serde::{Deserialize, Serialize};

pub const EVENT_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportEvent {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub event_version: String,
    pub event_source: String,
    pub event: ReportEvent,
}

impl Envelope {
    pub fn new(event_source: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            event_version: EVENT_VERSION.to_string(),
            event_source: event_source.into(),
            event: ReportEvent {
                title: title.into(),
                description: description.into(),
            },
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
