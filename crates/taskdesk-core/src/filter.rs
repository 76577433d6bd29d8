use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use tracing::trace;

use crate::datetime::parse_date_expr;
use crate::model::{
  Priority,
  Task,
  TaskStatus
};

/// Partial predicate over tasks. Every field that is set must hold; unset
/// fields impose nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
  pub status_id:     Option<i64>,
  pub priority:      Option<Priority>,
  pub owner:         Option<String>,
  pub assigned:      Option<String>,
  pub project_name:  Option<String>,
  pub task_number:   Option<String>,
  pub due_date_from: Option<DateTime<Utc>>,
  pub due_date_to:   Option<DateTime<Utc>>
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pred<'a> {
  StatusEq(i64),
  PriorityEq(Priority),
  OwnerContains(&'a str),
  AssignedContains(&'a str),
  ProjectContains(&'a str),
  NumberContains(&'a str),
  DueFrom(DateTime<Utc>),
  DueTo(DateTime<Utc>)
}

impl TaskFilter {
  pub fn is_empty(&self) -> bool {
    self.predicates().is_empty()
  }

  /// Active predicates in evaluation order.
  pub fn predicates(
    &self
  ) -> Vec<Pred<'_>> {
    let mut out = Vec::new();
    if let Some(id) = self.status_id {
      out.push(Pred::StatusEq(id));
    }
    if let Some(priority) =
      self.priority
    {
      out.push(Pred::PriorityEq(
        priority
      ));
    }
    if let Some(owner) =
      self.owner.as_deref()
    {
      out.push(Pred::OwnerContains(
        owner
      ));
    }
    if let Some(assigned) =
      self.assigned.as_deref()
    {
      out.push(Pred::AssignedContains(
        assigned
      ));
    }
    if let Some(project) =
      self.project_name.as_deref()
    {
      out.push(Pred::ProjectContains(
        project
      ));
    }
    if let Some(number) =
      self.task_number.as_deref()
    {
      out.push(Pred::NumberContains(
        number
      ));
    }
    if let Some(from) =
      self.due_date_from
    {
      out.push(Pred::DueFrom(from));
    }
    if let Some(to) = self.due_date_to {
      out.push(Pred::DueTo(to));
    }
    out
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    self.first_violation(task).is_none()
  }

  /// The first active predicate `task` fails, if any.
  pub fn first_violation(
    &self,
    task: &Task
  ) -> Option<Pred<'_>> {
    self
      .predicates()
      .into_iter()
      .find(|pred| {
        !eval_pred(pred, task)
      })
  }

  /// Tasks passing every active predicate, in their original order.
  #[tracing::instrument(skip_all, fields(total = tasks.len()))]
  pub fn apply(
    &self,
    tasks: &[Task]
  ) -> Vec<Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task))
      .cloned()
      .collect()
  }

  /// Builds a filter from `key:value` terms.
  ///
  /// Keys: `status`, `priority`, `owner`, `assigned`, `project`, `number`,
  /// `due.from`, `due.to`. Status accepts an id or a name from `statuses`.
  /// A repeated key keeps its last value.
  #[tracing::instrument(skip(
    terms, statuses, now, tz
  ))]
  pub fn parse(
    terms: &[String],
    statuses: &[TaskStatus],
    now: DateTime<Utc>,
    tz: Tz
  ) -> anyhow::Result<Self> {
    let mut filter = TaskFilter::default();

    for term in terms {
      let (key, value) = term
        .split_once(':')
        .ok_or_else(|| {
          anyhow!(
            "filter term must be \
             key:value, got: {term}"
          )
        })?;
      let value = value.trim();
      if value.is_empty() {
        return Err(anyhow!(
          "filter term has no value: \
           {term}"
        ));
      }

      match key
        .trim()
        .to_ascii_lowercase()
        .as_str()
      {
        | "status" => {
          filter.status_id = Some(
            resolve_status(
              value, statuses
            )?
          );
        }
        | "priority" | "pri" => {
          filter.priority =
            Some(value.parse()?);
        }
        | "owner" => {
          filter.owner =
            Some(value.to_string());
        }
        | "assigned" => {
          filter.assigned =
            Some(value.to_string());
        }
        | "project" => {
          filter.project_name =
            Some(value.to_string());
        }
        | "number" => {
          filter.task_number =
            Some(value.to_string());
        }
        | "due.from" | "due.after" => {
          filter.due_date_from = Some(
            parse_date_expr(
              value, now, tz
            )?
          );
        }
        | "due.to" | "due.before" => {
          filter.due_date_to = Some(
            parse_date_expr(
              value, now, tz
            )?
          );
        }
        | other => {
          return Err(anyhow!(
            "unknown filter key: \
             {other}"
          ));
        }
      }
    }

    Ok(filter)
  }
}

fn resolve_status(
  value: &str,
  statuses: &[TaskStatus]
) -> anyhow::Result<i64> {
  if let Ok(id) = value.parse::<i64>() {
    return Ok(id);
  }

  statuses
    .iter()
    .find(|status| {
      status.name.to_lowercase()
        == value.to_lowercase()
    })
    .map(|status| status.id)
    .ok_or_else(|| {
      anyhow!(
        "unknown task status: {value}"
      )
    })
}

fn contains_ci(
  haystack: &str,
  needle: &str
) -> bool {
  haystack
    .to_lowercase()
    .contains(&needle.to_lowercase())
}

fn eval_pred(
  pred: &Pred<'_>,
  task: &Task
) -> bool {
  let ok = match pred {
    | Pred::StatusEq(id) => {
      task.status_id == *id
    }
    | Pred::PriorityEq(priority) => {
      task.priority == *priority
    }
    | Pred::OwnerContains(owner) => {
      contains_ci(&task.owner, owner)
    }
    | Pred::AssignedContains(
      assigned
    ) => contains_ci(
      &task.assigned,
      assigned
    ),
    | Pred::ProjectContains(project) => {
      contains_ci(
        &task.project_name,
        project
      )
    }
    | Pred::NumberContains(number) => {
      contains_ci(
        &task.task_number,
        number
      )
    }
    // Undated tasks are never excluded by a due bound.
    | Pred::DueFrom(from) => task
      .due_date
      .is_none_or(|due| due >= *from),
    | Pred::DueTo(to) => task
      .due_date
      .is_none_or(|due| due <= *to),
  };

  trace!(pred = ?pred, id = task.id, ok, "filter predicate evaluation");
  ok
}
