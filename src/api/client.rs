use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::types::{MessageDraft, PortalApi};
use crate::config::PortalConfig;
use crate::core::{Activity, AdminStats, Application, ApplicationStatus, Feedback, Interview, Message};

/// List endpoints answer either with a bare array or `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

pub struct HttpPortalApi {
    base_url: String,
    token: Option<String>,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl HttpPortalApi {
    pub fn new(config: &PortalConfig, token: Option<String>) -> Result<Self, ApiError> {
        let base_url = config.api_base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("api base url cannot be empty".to_string()));
        }
        if config.request_timeout_ms == 0 {
            return Err(ApiError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            token: token.filter(|token| !token.trim().is_empty()),
            timeout_ms: config.request_timeout_ms,
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.request_timeout_ms))
                .build()
                .map_err(|error| ApiError::Config(error.to_string()))?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|error| self.map_connectivity_error(path, error))?;

        let status = response.status();
        tracing::debug!("portal API response: {path} status={}", status.as_u16());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(format!(
                "{path} returned status {}",
                status.as_u16()
            )));
        }
        Err(ApiError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .send(path, self.request(reqwest::Method::GET, path))
            .await?;
        response.json::<T>().await.map_err(|error| {
            ApiError::InvalidResponse(format!("failed to parse {path} JSON: {error}"))
        })
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let body: ListBody<T> = self.get_json(path).await?;
        Ok(body.into_vec())
    }

    async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.send(path, self.request(reqwest::Method::PUT, path).json(body))
            .await?;
        Ok(())
    }

    fn map_connectivity_error(&self, path: &str, error: reqwest::Error) -> ApiError {
        if error.is_connect() {
            return ApiError::Request(format!(
                "could not reach the portal API at {}: {error}",
                self.base_url
            ));
        }
        if error.is_timeout() {
            return ApiError::Timeout(format!(
                "{path} timed out after {} ms",
                self.timeout_ms
            ));
        }
        ApiError::from(error)
    }
}

fn record_path(collection: &str, id: &str, action: &str) -> String {
    format!("/{collection}/{}/{action}", urlencoding::encode(id))
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn list_messages(&self) -> Result<Vec<Message>, ApiError> {
        self.get_list("/messages").await
    }

    async fn send_message(&self, draft: &MessageDraft) -> Result<Message, ApiError> {
        let path = "/messages";
        let response = self
            .send(path, self.request(reqwest::Method::POST, path).json(draft))
            .await?;
        response.json::<Message>().await.map_err(|error| {
            ApiError::InvalidResponse(format!("failed to parse {path} JSON: {error}"))
        })
    }

    async fn mark_message_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_json(&record_path("messages", id, "read"), &json!({}))
            .await
    }

    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError> {
        self.get_list("/interviews").await
    }

    async fn respond_to_interview(&self, id: &str, confirmed: bool) -> Result<(), ApiError> {
        self.put_json(
            &record_path("interviews", id, "confirm"),
            &json!({ "confirmed": confirmed }),
        )
        .await
    }

    async fn mark_interview_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_json(&record_path("interviews", id, "read"), &json!({}))
            .await
    }

    async fn list_feedback(&self) -> Result<Vec<Feedback>, ApiError> {
        self.get_list("/feedback").await
    }

    async fn mark_feedback_read(&self, id: &str) -> Result<(), ApiError> {
        self.put_json(&record_path("feedback", id, "read"), &json!({}))
            .await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.get_list("/applications").await
    }

    async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<(), ApiError> {
        self.put_json(
            &record_path("applications", id, "status"),
            &json!({ "status": status }),
        )
        .await
    }

    async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.get_json("/admin/stats").await
    }

    async fn recent_activity(&self) -> Result<Vec<Activity>, ApiError> {
        self.get_list("/admin/activity").await
    }
}
