//! Wire-level data model: task messages, service messages, and the
//! metadata union the dispatcher actually operates on.
//!
//! Decoded payloads arrive as JSON-shaped maps (the broker adapter is
//! responsible for turning whatever wire format it speaks into this
//! representation); this module only cares about the map's shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded, not-yet-classified broker payload.
pub type RawPayload = serde_json::Map<String, Value>;

/// Application-level context snapshotted per task from the dispatcher's
/// stream-data bundle, merged with the task's own `data` field.
pub type DataBundle = BTreeMap<String, Value>;

/// Out-of-band commands carried by a [`ServiceMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Ask the pool for a task's current status.
    GetStatus,
    /// Forcibly cancel a running task.
    Closing,
}

/// A unit of application work: carries a unique identifier and a
/// routing discriminator. Never carries `command`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub uuid: String,
    pub type_event: String,
    #[serde(default)]
    pub data: Option<RawPayload>,
}

/// An out-of-band control message keyed to an existing task's
/// identifier. Never carries `type_event` or `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
    pub uuid: String,
    pub command: Command,
}

/// The tagged union the dispatcher's `listen` ingress accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    Task(TaskMessage),
    Service(ServiceMessage),
}

impl Metadata {
    /// The task identifier this metadata targets, regardless of variant.
    pub fn uuid(&self) -> &str {
        match self {
            Metadata::Task(t) => &t.uuid,
            Metadata::Service(s) => &s.uuid,
        }
    }

    pub fn as_task(&self) -> Option<&TaskMessage> {
        match self {
            Metadata::Task(t) => Some(t),
            Metadata::Service(_) => None,
        }
    }
}

/// Whether a task is currently occupying the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Unknown,
}
