//! JSON shapes exchanged with the backend and the conversions between them
//! and the domain model.
//!
//! Decoding is tolerant: text fields may be `null`, status ids may arrive
//! as numbers or numeric strings, and unreadable dates become absent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::datetime::{format_wire, parse_wire};
use crate::model::{Priority, StatusRef, Task, TaskDraft, TaskStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct WireTask {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub status_id: Option<i64>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub assigned: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub task_number: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireStatus {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Outgoing task body for `POST`/`PUT`. Unset fields are omitted so a `PUT`
/// stays a partial update.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

impl TaskPayload {
    /// Names of the fields a create request cannot go without. Blank text
    /// and a zero status id count as missing.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let blank = |value: &Option<String>| value.as_deref().is_none_or(str::is_empty);

        let mut missing = Vec::new();
        if blank(&self.title) {
            missing.push("title");
        }
        if self.status_id.is_none_or(|id| id == 0) {
            missing.push("status_id");
        }
        if self.priority.is_none() {
            missing.push("priority");
        }
        if blank(&self.owner) {
            missing.push("owner");
        }
        if blank(&self.project_name) {
            missing.push("project_name");
        }
        if blank(&self.task_number) {
            missing.push("task_number");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusPayload {
    pub name: String,
}

impl From<WireTask> for Task {
    fn from(wire: WireTask) -> Self {
        Task {
            id: wire.id,
            title: wire.title.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            status_id: wire.status_id.unwrap_or_default(),
            priority: wire
                .priority
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default(),
            owner: wire.owner.unwrap_or_default(),
            assigned: wire.assigned.unwrap_or_default(),
            project_name: wire.project_name.unwrap_or_default(),
            task_number: wire.task_number.unwrap_or_default(),
            due_date: wire.due_date.as_deref().and_then(parse_wire),
            created_at: wire.created_at.as_deref().and_then(parse_wire),
            updated_at: wire.updated_at.as_deref().and_then(parse_wire),
        }
    }
}

impl From<WireStatus> for TaskStatus {
    fn from(wire: WireStatus) -> Self {
        TaskStatus {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
            created_at: wire.created_at.as_deref().and_then(parse_wire),
            updated_at: wire.updated_at.as_deref().and_then(parse_wire),
        }
    }
}

impl From<&TaskDraft> for TaskPayload {
    fn from(draft: &TaskDraft) -> Self {
        TaskPayload {
            title: draft.title.clone(),
            description: draft.description.clone(),
            status_id: draft.status_id.as_ref().and_then(StatusRef::resolve),
            priority: draft.priority,
            owner: draft.owner.clone(),
            assigned: draft.assigned.clone(),
            project_name: draft.project_name.clone(),
            task_number: draft.task_number.clone(),
            due_date: draft.due_date.map(format_wire),
        }
    }
}

/// Decodes a collection body. An empty body or a JSON `null` is an empty
/// collection.
pub fn decode_list<W: DeserializeOwned>(body: &str) -> Result<Vec<W>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Option<Vec<W>> = serde_json::from_str(body)?;
    Ok(parsed.unwrap_or_default())
}

/// Decodes a single resource, reading an empty body or `null` as `None`.
pub fn decode_optional<W: DeserializeOwned>(body: &str) -> Result<Option<W>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

fn flexible_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| match raw {
        RawId::Int(id) => Some(id),
        RawId::Float(value) if value.fract() == 0.0 => Some(value as i64),
        RawId::Float(_) => None,
        RawId::Text(text) => StatusRef::Text(text).resolve(),
    }))
}
