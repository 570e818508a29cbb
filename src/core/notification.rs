//! Common envelope for the unified notification feed.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::records::{Feedback, Interview, Message, ReadFlag, ReadPatch};
use super::snapshot::SnapshotRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Interview,
    Feedback,
}

impl NotificationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Interview => "interview",
            Self::Feedback => "feedback",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed entry. Ids are only unique per kind, so identity is `kind:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    /// Kind-specific passthrough fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    pub fn key_for(kind: NotificationKind, id: &str) -> String {
        format!("{kind}:{id}")
    }

    pub fn from_message(message: &Message) -> Self {
        let mut extra = Map::new();
        extra.insert("senderId".to_string(), json!(message.sender_id));
        if let Some(job_id) = &message.job_id {
            extra.insert("jobId".to_string(), json!(job_id));
        }
        Self {
            id: message.id.clone(),
            kind: NotificationKind::Message,
            content: message.content.clone(),
            sender_name: message.sender_name.clone(),
            timestamp: message.timestamp,
            read: message.read,
            extra,
        }
    }

    pub fn from_interview(interview: &Interview) -> Self {
        let mut extra = Map::new();
        extra.insert("jobTitle".to_string(), json!(interview.job_title));
        extra.insert("date".to_string(), json!(interview.date));
        extra.insert(
            "jobSeekerConfirmed".to_string(),
            json!(interview.job_seeker_confirmed),
        );
        if let Some(location) = &interview.location {
            extra.insert("location".to_string(), json!(location));
        }
        Self {
            id: interview.id.clone(),
            kind: NotificationKind::Interview,
            content: format!(
                "Interview for {} on {}",
                interview.job_title,
                interview.date.format("%Y-%m-%d %H:%M UTC")
            ),
            sender_name: interview.employer_name.clone(),
            timestamp: interview.issued_at(),
            read: interview.read,
            extra,
        }
    }

    pub fn from_feedback(feedback: &Feedback) -> Self {
        let mut extra = Map::new();
        extra.insert("jobTitle".to_string(), json!(feedback.job_title));
        if let Some(rating) = feedback.rating {
            extra.insert("rating".to_string(), json!(rating));
        }
        if let Some(application_id) = &feedback.application_id {
            extra.insert("applicationId".to_string(), json!(application_id));
        }
        Self {
            id: feedback.id.clone(),
            kind: NotificationKind::Feedback,
            content: feedback.comment.clone(),
            sender_name: feedback.employer_name.clone(),
            timestamp: feedback.timestamp,
            read: feedback.read,
            extra,
        }
    }
}

impl SnapshotRecord for Notification {
    type Patch = ReadPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn key(&self) -> Cow<'_, str> {
        Cow::Owned(Self::key_for(self.kind, &self.id))
    }

    fn has_key(&self, key: &str) -> bool {
        key.split_once(':') == Some((self.kind.as_str(), self.id.as_str()))
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }

    fn apply_patch(&mut self, patch: ReadPatch) {
        self.read |= patch.read;
    }
}

impl ReadFlag for Notification {
    fn is_read(&self) -> bool {
        self.read
    }

    fn set_read(&mut self) {
        self.read = true;
    }
}
