use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::{build_http_client, execute};
use crate::error::ApiError;

pub const DEFAULT_AUTH_URL: &str = "http://localhost:8090";

const LOGIN_FAILED: &str = "Incorrect username or password";
const REGISTER_FAILED: &str = "Registration failed.";

/// An authenticated identity. The token is attached as a bearer header to
/// every API request made with this session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(auth_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: auth_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let (ok, body) = self.post("/login", username, password).await?;
        let token = ok.then(|| parse_token(&body)).flatten();
        match token {
            Some(token) => {
                info!(username, "logged in");
                Ok(Session {
                    username: username.to_string(),
                    token,
                })
            }
            None => {
                warn!(username, "login rejected");
                Err(ApiError::Auth(LOGIN_FAILED.to_string()))
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let (ok, body) = self.post("/register", username, password).await?;
        if ok && let Some(token) = parse_token(&body) {
            info!(username, "registered");
            return Ok(Session {
                username: username.to_string(),
                token,
            });
        }

        let reason = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|reason| !reason.trim().is_empty());
        warn!(username, reason = ?reason, "registration rejected");
        Err(ApiError::Auth(match reason {
            Some(reason) => format!("{REGISTER_FAILED} {}", reason.trim()),
            None => REGISTER_FAILED.to_string(),
        }))
    }

    async fn post(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<(bool, String), ApiError> {
        if username.trim().is_empty() || password.is_empty() {
            let mut missing = Vec::new();
            if username.trim().is_empty() {
                missing.push("username");
            }
            if password.is_empty() {
                missing.push("password");
            }
            return Err(ApiError::MissingFields(missing));
        }

        let url = format!("{}{}", self.base_url, path);
        let request = self.http.post(&url).json(&Credentials { username, password });
        let (status, body) = execute(request, &url).await?;
        Ok((status.is_success(), body))
    }
}

fn parse_token(body: &str) -> Option<String> {
    serde_json::from_str::<TokenResponse>(body)
        .ok()
        .map(|parsed| parsed.token)
        .filter(|token| !token.is_empty())
}
