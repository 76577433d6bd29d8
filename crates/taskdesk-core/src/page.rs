//! Page-level orchestration: local task/status state kept in step with the
//! server, one error banner, and request generations so a late response
//! can never overwrite a newer one.

use tracing::{debug, error, info, instrument, warn};

use crate::api::{TaskApi, WriteOutcome};
use crate::error::ApiError;
use crate::filter::TaskFilter;
use crate::model::{Task, TaskDraft, TaskStatus};

pub const FETCH_TASKS_FAILED: &str = "Failed to fetch tasks";
pub const FETCH_STATUSES_FAILED: &str = "Failed to fetch task statuses";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTask,
    UpdateTask,
    DeleteTask,
    CreateStatus,
    UpdateStatus,
    DeleteStatus,
}

impl Action {
    pub fn failure_message(self) -> &'static str {
        match self {
            Action::CreateTask => "Failed to create task",
            Action::UpdateTask => "Failed to update task",
            Action::DeleteTask => "Failed to delete task",
            Action::CreateStatus => "Failed to create task status",
            Action::UpdateStatus => "Failed to update task status",
            Action::DeleteStatus => "Failed to delete task status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Submitting(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Tasks,
    Statuses,
}

/// Identifies one issued fetch. Only the most recently issued ticket for a
/// slot may apply its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    slot: Slot,
    seq: u64,
}

impl Ticket {
    pub fn slot(&self) -> Slot {
        self.slot
    }
}

#[derive(Debug, Default, Clone)]
pub struct RequestGenerations {
    tasks: u64,
    statuses: u64,
}

impl RequestGenerations {
    fn counter(&mut self, slot: Slot) -> &mut u64 {
        match slot {
            Slot::Tasks => &mut self.tasks,
            Slot::Statuses => &mut self.statuses,
        }
    }

    pub fn issue(&mut self, slot: Slot) -> Ticket {
        let counter = self.counter(slot);
        *counter += 1;
        Ticket {
            slot,
            seq: *counter,
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        let latest = match ticket.slot {
            Slot::Tasks => self.tasks,
            Slot::Statuses => self.statuses,
        };
        ticket.seq == latest
    }
}

pub struct TasksPage<A> {
    api: A,
    tasks: Vec<Task>,
    statuses: Vec<TaskStatus>,
    phase: Phase,
    error: Option<&'static str>,
    editing: Option<i64>,
    generations: RequestGenerations,
}

impl<A: TaskApi> TasksPage<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            tasks: Vec::new(),
            statuses: Vec::new(),
            phase: Phase::Idle,
            error: None,
            editing: None,
            generations: RequestGenerations::default(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn statuses(&self) -> &[TaskStatus] {
        &self.statuses
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The banner message left by the last failed action, if any.
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    pub fn editing(&self) -> Option<&Task> {
        let id = self.editing?;
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Name of the status a task points at. Unknown ids render as `None`.
    pub fn status_name(&self, status_id: i64) -> Option<&str> {
        self.statuses
            .iter()
            .find(|status| status.id == status_id)
            .map(|status| status.name.as_str())
    }

    pub fn visible_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        filter.apply(&self.tasks)
    }

    pub fn begin_edit(&mut self, id: i64) -> bool {
        if self.task(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        true
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn begin_fetch(&mut self, slot: Slot) -> Ticket {
        self.generations.issue(slot)
    }

    /// Applies a task list response. Returns false when a newer fetch has
    /// been issued since `ticket`, in which case nothing changes.
    pub fn apply_tasks(&mut self, ticket: Ticket, result: Result<Vec<Task>, ApiError>) -> bool {
        if ticket.slot != Slot::Tasks || !self.generations.is_current(ticket) {
            debug!(?ticket, "discarding stale task list response");
            return false;
        }
        match result {
            Ok(tasks) => self.tasks = tasks,
            Err(err) => {
                error!(error = %err, "error fetching tasks");
                self.error = Some(FETCH_TASKS_FAILED);
                self.tasks.clear();
            }
        }
        true
    }

    /// Status counterpart of [`TasksPage::apply_tasks`].
    pub fn apply_statuses(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<TaskStatus>, ApiError>,
    ) -> bool {
        if ticket.slot != Slot::Statuses || !self.generations.is_current(ticket) {
            debug!(?ticket, "discarding stale status list response");
            return false;
        }
        match result {
            Ok(statuses) => self.statuses = statuses,
            Err(err) => {
                error!(error = %err, "error fetching task statuses");
                self.error = Some(FETCH_STATUSES_FAILED);
                self.statuses.clear();
            }
        }
        true
    }

    #[instrument(skip(self))]
    pub async fn load(&mut self) {
        self.phase = Phase::Loading;
        let tasks_ticket = self.begin_fetch(Slot::Tasks);
        let statuses_ticket = self.begin_fetch(Slot::Statuses);

        let (tasks, statuses) = tokio::join!(self.api.list_tasks(), self.api.list_statuses());
        self.apply_tasks(tasks_ticket, tasks);
        self.apply_statuses(statuses_ticket, statuses);

        self.phase = Phase::Ready;
        info!(
            tasks = self.tasks.len(),
            statuses = self.statuses.len(),
            "page loaded"
        );
    }

    pub async fn refresh_tasks(&mut self) -> bool {
        let ticket = self.begin_fetch(Slot::Tasks);
        let result = self.api.list_tasks().await;
        let ok = result.is_ok();
        self.apply_tasks(ticket, result) && ok
    }

    pub async fn refresh_statuses(&mut self) -> bool {
        let ticket = self.begin_fetch(Slot::Statuses);
        let result = self.api.list_statuses().await;
        let ok = result.is_ok();
        self.apply_statuses(ticket, result) && ok
    }

    fn fail(&mut self, action: Action, err: ApiError) -> bool {
        error!(?action, error = %err, "action failed");
        self.error = Some(action.failure_message());
        self.phase = Phase::Ready;
        false
    }

    fn succeed(&mut self) -> bool {
        self.error = None;
        self.phase = Phase::Ready;
        true
    }

    #[instrument(skip(self, draft))]
    pub async fn create_task(&mut self, draft: &TaskDraft) -> bool {
        self.phase = Phase::Submitting(Action::CreateTask);
        match self.api.create_task(draft).await {
            Ok(WriteOutcome::Confirmed(task)) => {
                debug!(id = task.id, "appending created task");
                self.tasks.push(task);
                self.succeed()
            }
            Ok(WriteOutcome::Synthesized { .. }) => {
                // No id came back, so the new row can only be found by
                // reloading.
                self.succeed();
                self.refresh_tasks().await
            }
            Err(err) => self.fail(Action::CreateTask, err),
        }
    }

    #[instrument(skip(self, draft))]
    pub async fn update_task(&mut self, id: i64, draft: &TaskDraft) -> bool {
        self.phase = Phase::Submitting(Action::UpdateTask);
        match self.api.update_task(id, draft).await {
            Ok(outcome) => {
                self.apply_task_write(id, outcome);
                if self.editing == Some(id) {
                    self.editing = None;
                }
                self.succeed()
            }
            Err(err) => self.fail(Action::UpdateTask, err),
        }
    }

    /// Submits the edit form for the task chosen with
    /// [`TasksPage::begin_edit`].
    pub async fn submit_edit(&mut self, draft: &TaskDraft) -> bool {
        match self.editing {
            Some(id) => self.update_task(id, draft).await,
            None => {
                warn!("submit_edit called with no task being edited");
                false
            }
        }
    }

    fn apply_task_write(&mut self, id: i64, outcome: WriteOutcome<Task, TaskDraft>) {
        let replacement = match outcome {
            WriteOutcome::Confirmed(task) => Some(task),
            WriteOutcome::Synthesized { submitted, .. } => {
                self.task(id).map(|existing| existing.merged(&submitted))
            }
        };
        let Some(replacement) = replacement else {
            warn!(id, "updated task is not in the local list");
            return;
        };
        for slot in self.tasks.iter_mut() {
            if slot.id == replacement.id {
                *slot = replacement.clone();
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&mut self, id: i64) -> bool {
        self.phase = Phase::Submitting(Action::DeleteTask);
        match self.api.delete_task(id).await {
            Ok(()) => {
                self.tasks.retain(|task| task.id != id);
                if self.editing == Some(id) {
                    self.editing = None;
                }
                self.succeed()
            }
            Err(err) => self.fail(Action::DeleteTask, err),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_status(&mut self, name: &str) -> bool {
        self.phase = Phase::Submitting(Action::CreateStatus);
        match self.api.create_status(name).await {
            Ok(_) => self.resync_statuses().await,
            Err(err) => self.fail(Action::CreateStatus, err),
        }
    }

    #[instrument(skip(self))]
    pub async fn update_status(&mut self, id: i64, name: &str) -> bool {
        self.phase = Phase::Submitting(Action::UpdateStatus);
        match self.api.update_status(id, name).await {
            Ok(_) => self.resync_statuses().await,
            Err(err) => self.fail(Action::UpdateStatus, err),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_status(&mut self, id: i64) -> bool {
        self.phase = Phase::Submitting(Action::DeleteStatus);
        match self.api.delete_status(id).await {
            Ok(()) => self.resync_statuses().await,
            Err(err) => self.fail(Action::DeleteStatus, err),
        }
    }

    async fn resync_statuses(&mut self) -> bool {
        self.succeed();
        self.refresh_statuses().await
    }
}
