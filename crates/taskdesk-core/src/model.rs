use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other} (expected low, medium or high)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status_id: i64,
    pub priority: Priority,
    pub owner: String,
    pub assigned: String,
    pub project_name: String,
    pub task_number: String,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Prefills an edit form with the task's current values.
    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            status_id: Some(StatusRef::Id(self.status_id)),
            priority: Some(self.priority),
            owner: Some(self.owner.clone()),
            assigned: Some(self.assigned.clone()),
            project_name: Some(self.project_name.clone()),
            task_number: Some(self.task_number.clone()),
            due_date: self.due_date,
        }
    }

    /// Overlays the fields present in `draft`. Used when the server
    /// acknowledges an update without echoing the record back.
    pub fn merged(&self, draft: &TaskDraft) -> Task {
        let mut out = self.clone();
        if let Some(title) = &draft.title {
            out.title = title.clone();
        }
        if let Some(description) = &draft.description {
            out.description = description.clone();
        }
        if let Some(status_id) = draft.status_id.as_ref().and_then(StatusRef::resolve) {
            out.status_id = status_id;
        }
        if let Some(priority) = draft.priority {
            out.priority = priority;
        }
        if let Some(owner) = &draft.owner {
            out.owner = owner.clone();
        }
        if let Some(assigned) = &draft.assigned {
            out.assigned = assigned.clone();
        }
        if let Some(project_name) = &draft.project_name {
            out.project_name = project_name.clone();
        }
        if let Some(task_number) = &draft.task_number {
            out.task_number = task_number.clone();
        }
        if draft.due_date.is_some() {
            out.due_date = draft.due_date;
        }
        out
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.map(|due| due < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub id: i64,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A status reference as typed by a user: either already numeric or raw
/// text still waiting to be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRef {
    Id(i64),
    Text(String),
}

impl StatusRef {
    /// Integer form of the reference. Text is read like a lenient integer
    /// parse: leading whitespace, optional sign, then as many digits as
    /// are present.
    pub fn resolve(&self) -> Option<i64> {
        match self {
            StatusRef::Id(id) => Some(*id),
            StatusRef::Text(raw) => parse_leading_int(raw),
        }
    }
}

impl From<i64> for StatusRef {
    fn from(id: i64) -> Self {
        StatusRef::Id(id)
    }
}

/// Create/update payload in its user-facing shape. Every field is optional:
/// creation validates presence, updates send only what is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<StatusRef>,
    pub priority: Option<Priority>,
    pub owner: Option<String>,
    pub assigned: Option<String>,
    pub project_name: Option<String>,
    pub task_number: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    /// Coerces a textual status reference to its integer form. Text with no
    /// leading digits drops the field.
    pub fn normalized(&self) -> TaskDraft {
        let mut out = self.clone();
        out.status_id = self
            .status_id
            .as_ref()
            .and_then(StatusRef::resolve)
            .map(StatusRef::Id);
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskDraft::default()
    }
}

fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
