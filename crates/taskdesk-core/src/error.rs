use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the REST and auth clients.
///
/// Non-success HTTP statuses collapse into one variant per operation kind;
/// the page layer turns any of these into a fixed banner message.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(
    "missing required fields: {}",
    .0.join(", ")
  )]
  MissingFields(Vec<&'static str>),

  #[error(
    "failed to fetch {resource} (HTTP \
     {status})"
  )]
  Fetch {
    resource: &'static str,
    status:   StatusCode
  },

  #[error(
    "failed to create {resource} (HTTP \
     {status})"
  )]
  Create {
    resource: &'static str,
    status:   StatusCode,
    detail:   Option<String>
  },

  #[error(
    "failed to update {resource} (HTTP \
     {status})"
  )]
  Update {
    resource: &'static str,
    status:   StatusCode
  },

  #[error(
    "failed to delete {resource} (HTTP \
     {status})"
  )]
  Delete {
    resource: &'static str,
    status:   StatusCode
  },

  #[error(
    "failed to decode {resource} \
     response"
  )]
  Decode {
    resource: &'static str,
    #[source]
    source:   serde_json::Error
  },

  #[error("request to {url} failed")]
  Transport {
    url:    String,
    #[source]
    source: reqwest::Error
  },

  #[error("{0}")]
  Auth(String)
}

impl ApiError {
  /// True when the request was rejected before anything went on the wire.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      ApiError::MissingFields(_)
    )
  }
}

#[cfg(test)]
mod tests {
  use reqwest::StatusCode;

  use super::ApiError;

  #[test]
  fn missing_fields_lists_every_field() {
    let err = ApiError::MissingFields(
      vec!["owner", "project_name"]
    );
    assert!(err.is_validation());
    assert_eq!(
      err.to_string(),
      "missing required fields: owner, \
       project_name"
    );
  }

  #[test]
  fn http_failures_name_the_resource() {
    let err = ApiError::Fetch {
      resource: "tasks",
      status:   StatusCode::BAD_GATEWAY
    };
    assert!(!err.is_validation());
    assert!(
      err
        .to_string()
        .starts_with("failed to fetch tasks")
    );
  }
}
