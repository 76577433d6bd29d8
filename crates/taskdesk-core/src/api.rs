use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::auth::Session;
use crate::error::ApiError;
use crate::model::{Task, TaskDraft, TaskStatus};
use crate::wire::{self, StatusPayload, TaskPayload, WireStatus, WireTask};

pub const DEFAULT_API_URL: &str = "http://localhost:8090/api";

/// Result of a create or update call.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T, S> {
    /// The server echoed the stored record.
    Confirmed(T),
    /// The server answered success with an empty body. `submitted` is the
    /// normalized payload that was sent; `id` is known only for updates.
    /// This is a best-effort view, not a server-confirmed record.
    Synthesized { id: Option<i64>, submitted: S },
}

impl<T, S> WriteOutcome<T, S> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteOutcome::Confirmed(_))
    }
}

pub type TaskWrite = WriteOutcome<Task, TaskDraft>;
pub type StatusWrite = WriteOutcome<TaskStatus, String>;

/// REST operations for tasks and statuses.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;
    async fn get_task(&self, id: i64) -> Result<Task, ApiError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<TaskWrite, ApiError>;
    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<TaskWrite, ApiError>;
    async fn delete_task(&self, id: i64) -> Result<(), ApiError>;

    async fn list_statuses(&self) -> Result<Vec<TaskStatus>, ApiError>;
    async fn get_status(&self, id: i64) -> Result<TaskStatus, ApiError>;
    async fn create_status(&self, name: &str) -> Result<StatusWrite, ApiError>;
    async fn update_status(&self, id: i64, name: &str) -> Result<StatusWrite, ApiError>;
    async fn delete_status(&self, id: i64) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

pub(crate) fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|source| ApiError::Transport {
        url: "<client builder>".to_string(),
        source,
    })
}

/// Sends a prepared request and reads the whole body as text.
pub(crate) async fn execute(
    request: RequestBuilder,
    url: &str,
) -> Result<(StatusCode, String), ApiError> {
    let response = request.send().await.map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;
    debug!(url, status = %status, bytes = body.len(), "received response");
    Ok((status, body))
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl ApiClient {
    pub fn new(settings: &ClientSettings, session: Option<Session>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client(settings.timeout)?,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.session {
            Some(session) => builder.bearer_auth(&session.token),
            None => builder,
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), ApiError> {
        let url = self.url(path);
        debug!(method = %method, url = %url, "sending request");
        let mut request = self.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        execute(request, &url).await
    }

    async fn fetch_list<W>(&self, path: &str, resource: &'static str) -> Result<Vec<W>, ApiError>
    where
        W: serde::de::DeserializeOwned,
    {
        let (status, body) = self.send::<()>(Method::GET, path, None).await?;
        if !status.is_success() {
            warn!(resource, status = %status, "fetch failed");
            return Err(ApiError::Fetch { resource, status });
        }
        wire::decode_list(&body).map_err(|source| ApiError::Decode { resource, source })
    }

    async fn fetch_one<W>(&self, path: &str, resource: &'static str) -> Result<W, ApiError>
    where
        W: serde::de::DeserializeOwned,
    {
        let (status, body) = self.send::<()>(Method::GET, path, None).await?;
        if !status.is_success() {
            warn!(resource, status = %status, "fetch failed");
            return Err(ApiError::Fetch { resource, status });
        }
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { resource, source })
    }

    async fn remove(&self, path: &str, resource: &'static str) -> Result<(), ApiError> {
        let (status, _) = self.send::<()>(Method::DELETE, path, None).await?;
        if !status.is_success() {
            warn!(resource, status = %status, "delete failed");
            return Err(ApiError::Delete { resource, status });
        }
        Ok(())
    }
}

fn require_name(name: &str) -> Result<StatusPayload, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::MissingFields(vec!["name"]));
    }
    Ok(StatusPayload {
        name: trimmed.to_string(),
    })
}

#[async_trait]
impl TaskApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let tasks = self.fetch_list::<WireTask>("/tasks", "tasks").await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks.into_iter().map(Task::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.fetch_one::<WireTask>(&format!("/tasks/{id}"), "task")
            .await
            .map(Task::from)
    }

    #[instrument(skip(self, draft))]
    async fn create_task(&self, draft: &TaskDraft) -> Result<TaskWrite, ApiError> {
        let normalized = draft.normalized();
        let payload = TaskPayload::from(&normalized);
        debug!(?payload, "creating task");

        let missing = payload.missing_required();
        if !missing.is_empty() {
            warn!(?missing, "task creation rejected before sending");
            return Err(ApiError::MissingFields(missing));
        }

        let (status, body) = self.send(Method::POST, "/tasks", Some(&payload)).await?;
        if !status.is_success() {
            error!(status = %status, body = %body, "server rejected task creation");
            let detail = Some(body.trim().to_string()).filter(|text| !text.is_empty());
            return Err(ApiError::Create {
                resource: "task",
                status,
                detail,
            });
        }

        let created = wire::decode_optional::<WireTask>(&body).map_err(|source| {
            ApiError::Decode {
                resource: "task",
                source,
            }
        })?;
        Ok(match created {
            Some(wire) => WriteOutcome::Confirmed(Task::from(wire)),
            None => {
                warn!("task created but response body was empty");
                WriteOutcome::Synthesized {
                    id: None,
                    submitted: normalized,
                }
            }
        })
    }

    #[instrument(skip(self, draft))]
    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<TaskWrite, ApiError> {
        let normalized = draft.normalized();
        let payload = TaskPayload::from(&normalized);
        debug!(?payload, "updating task");

        let (status, body) = self
            .send(Method::PUT, &format!("/tasks/{id}"), Some(&payload))
            .await?;
        if !status.is_success() {
            warn!(status = %status, "task update failed");
            return Err(ApiError::Update {
                resource: "task",
                status,
            });
        }

        let updated = wire::decode_optional::<WireTask>(&body).map_err(|source| {
            ApiError::Decode {
                resource: "task",
                source,
            }
        })?;
        Ok(match updated {
            Some(wire) => WriteOutcome::Confirmed(Task::from(wire)),
            None => {
                debug!("empty update response; synthesizing from submitted fields");
                WriteOutcome::Synthesized {
                    id: Some(id),
                    submitted: normalized,
                }
            }
        })
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        self.remove(&format!("/tasks/{id}"), "task").await
    }

    #[instrument(skip(self))]
    async fn list_statuses(&self) -> Result<Vec<TaskStatus>, ApiError> {
        let statuses = self
            .fetch_list::<WireStatus>("/statuses", "task statuses")
            .await?;
        debug!(count = statuses.len(), "fetched task statuses");
        Ok(statuses.into_iter().map(TaskStatus::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_status(&self, id: i64) -> Result<TaskStatus, ApiError> {
        self.fetch_one::<WireStatus>(&format!("/statuses/{id}"), "task status")
            .await
            .map(TaskStatus::from)
    }

    #[instrument(skip(self))]
    async fn create_status(&self, name: &str) -> Result<StatusWrite, ApiError> {
        let payload = require_name(name)?;
        let (status, body) = self.send(Method::POST, "/statuses", Some(&payload)).await?;
        if !status.is_success() {
            warn!(status = %status, body = %body, "task status creation failed");
            let detail = Some(body.trim().to_string()).filter(|text| !text.is_empty());
            return Err(ApiError::Create {
                resource: "task status",
                status,
                detail,
            });
        }
        status_outcome(&body, None, payload.name)
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: i64, name: &str) -> Result<StatusWrite, ApiError> {
        let payload = require_name(name)?;
        let (status, body) = self
            .send(Method::PUT, &format!("/statuses/{id}"), Some(&payload))
            .await?;
        if !status.is_success() {
            warn!(status = %status, "task status update failed");
            return Err(ApiError::Update {
                resource: "task status",
                status,
            });
        }
        status_outcome(&body, Some(id), payload.name)
    }

    #[instrument(skip(self))]
    async fn delete_status(&self, id: i64) -> Result<(), ApiError> {
        self.remove(&format!("/statuses/{id}"), "task status").await
    }
}

fn status_outcome(body: &str, id: Option<i64>, name: String) -> Result<StatusWrite, ApiError> {
    let decoded = wire::decode_optional::<WireStatus>(body).map_err(|source| ApiError::Decode {
        resource: "task status",
        source,
    })?;
    Ok(match decoded {
        Some(wire) => WriteOutcome::Confirmed(TaskStatus::from(wire)),
        None => WriteOutcome::Synthesized {
            id,
            submitted: name,
        },
    })
}
