use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::core::{Activity, AdminStats, Application, ApplicationStatus, Feedback, Interview, Message};

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub receiver_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// REST collaborator consumed by the live views.
///
/// List calls return the authoritative snapshot for the signed-in user.
/// Mutations return once the backend acknowledged them.
#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn list_messages(&self) -> Result<Vec<Message>, ApiError>;
    async fn send_message(&self, draft: &MessageDraft) -> Result<Message, ApiError>;
    async fn mark_message_read(&self, id: &str) -> Result<(), ApiError>;

    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError>;
    async fn respond_to_interview(&self, id: &str, confirmed: bool) -> Result<(), ApiError>;
    async fn mark_interview_read(&self, id: &str) -> Result<(), ApiError>;

    async fn list_feedback(&self) -> Result<Vec<Feedback>, ApiError>;
    async fn mark_feedback_read(&self, id: &str) -> Result<(), ApiError>;

    async fn list_applications(&self) -> Result<Vec<Application>, ApiError>;
    async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<(), ApiError>;

    async fn admin_stats(&self) -> Result<AdminStats, ApiError>;
    async fn recent_activity(&self) -> Result<Vec<Activity>, ApiError>;
}
