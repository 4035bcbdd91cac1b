//! Conversational-memory service client
//!
//! Typed HTTP client for the external memory store that owns per-user
//! threads and message history. Thread lifecycle is the service's concern;
//! this system only creates threads lazily and appends to them.

use crate::config::MemoryConfig;
use crate::error::{AppError, AppResult};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// New-user provisioning payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
struct CreateThreadBody<'a> {
    thread_id: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContextBody {
    #[serde(default)]
    context: String,
}

/// Typed client for the conversational-memory service
pub struct MemoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl MemoryClient {
    pub fn new(config: &MemoryConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref key) = config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| AppError::Config(format!("invalid memory API key header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("memory HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return a thread id for this conversation, creating the user and a new
    /// thread when the client did not supply one.
    pub async fn ensure_thread(
        &self,
        user_id: &str,
        existing: Option<String>,
    ) -> AppResult<String> {
        if let Some(thread_id) = existing {
            return Ok(thread_id);
        }

        // Provisioning is idempotent: an already-existing user is not an error.
        let response = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(&serde_json::json!({ "user_id": user_id }))
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() && response.status() != StatusCode::CONFLICT {
            return Err(AppError::Memory(format!(
                "user provisioning returned {}",
                response.status()
            )));
        }

        let thread_id = Uuid::new_v4().simple().to_string();
        let response = self
            .http
            .post(format!("{}/threads", self.base_url))
            .json(&CreateThreadBody {
                thread_id: &thread_id,
                user_id,
            })
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "thread creation returned {}",
                response.status()
            )));
        }

        Ok(thread_id)
    }

    /// Append one message to a thread
    pub async fn append(&self, thread_id: &str, role: Role, content: &str) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/threads/{}/messages", self.base_url, thread_id))
            .json(&AppendBody { role, content })
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "message append returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Fetch the consolidated context block for a thread
    pub async fn context(&self, thread_id: &str) -> AppResult<String> {
        let response = self
            .http
            .get(format!("{}/threads/{}/context", self.base_url, thread_id))
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "context fetch returned {}",
                response.status()
            )));
        }
        let body: ContextBody = response
            .json()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        Ok(body.context)
    }

    /// Provision a user with profile details
    pub async fn create_user(&self, user: &NewUser) -> AppResult<()> {
        let response = self
            .http
            .post(format!("{}/users", self.base_url))
            .json(user)
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "user creation returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Remove a user's memory-store record
    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        let response = self
            .http
            .delete(format!("{}/users/{}", self.base_url, user_id))
            .send()
            .await
            .map_err(|e| AppError::Memory(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Memory(format!(
                "user deletion returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MemoryClient {
        MemoryClient::new(&MemoryConfig {
            base_url: server.uri(),
            api_key: None,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_thread_reuses_supplied_id() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        // No mocks mounted: reuse must not hit the network.
        let thread = client
            .ensure_thread("u1", Some("existing-thread".to_string()))
            .await
            .unwrap();
        assert_eq!(thread, "existing-thread");
    }

    #[tokio::test]
    async fn test_ensure_thread_creates_user_and_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(409))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let thread = client.ensure_thread("u1", None).await.unwrap();
        assert!(!thread.is_empty());
    }

    #[tokio::test]
    async fn test_context_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t1/context"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"context": "prior messages"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.context("t1").await.unwrap(), "prior messages");
    }

    #[tokio::test]
    async fn test_append_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .append("t1", Role::User, "hello")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
