//! Event kind names and the domain event envelope.
//!
//! Single source of truth for the wire names pushed by the portal backend and
//! the domain each kind belongs to.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event_channel::ChannelEvent;

// ---------------------------------------------------------------------------
// Wire names
// ---------------------------------------------------------------------------

pub const EVENT_MESSAGE_NEW: &str = "message:new";
pub const EVENT_INTERVIEW_SCHEDULED: &str = "interview:scheduled";
pub const EVENT_INTERVIEW_UPDATED: &str = "interview:updated";
pub const EVENT_FEEDBACK_NEW: &str = "feedback:new";
pub const EVENT_APPLICATION_STATUS: &str = "application:status";
pub const EVENT_STATS_UPDATE: &str = "stats:update";
pub const EVENT_ACTIVITY_NEW: &str = "activity:new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "message:new")]
    MessageNew,
    #[serde(rename = "interview:scheduled")]
    InterviewScheduled,
    #[serde(rename = "interview:updated")]
    InterviewUpdated,
    #[serde(rename = "feedback:new")]
    FeedbackNew,
    #[serde(rename = "application:status")]
    ApplicationStatus,
    #[serde(rename = "stats:update")]
    StatsUpdate,
    #[serde(rename = "activity:new")]
    ActivityNew,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MessageNew => EVENT_MESSAGE_NEW,
            Self::InterviewScheduled => EVENT_INTERVIEW_SCHEDULED,
            Self::InterviewUpdated => EVENT_INTERVIEW_UPDATED,
            Self::FeedbackNew => EVENT_FEEDBACK_NEW,
            Self::ApplicationStatus => EVENT_APPLICATION_STATUS,
            Self::StatsUpdate => EVENT_STATS_UPDATE,
            Self::ActivityNew => EVENT_ACTIVITY_NEW,
        }
    }

    pub const fn all() -> &'static [EventKind] {
        &[
            EventKind::MessageNew,
            EventKind::InterviewScheduled,
            EventKind::InterviewUpdated,
            EventKind::FeedbackNew,
            EventKind::ApplicationStatus,
            EventKind::StatsUpdate,
            EventKind::ActivityNew,
        ]
    }

    pub const fn domain_kind(&self) -> DomainKind {
        match self {
            Self::MessageNew => DomainKind::Message,
            Self::InterviewScheduled | Self::InterviewUpdated => DomainKind::Interview,
            Self::FeedbackNew => DomainKind::Feedback,
            Self::ApplicationStatus => DomainKind::StatusChange,
            Self::StatsUpdate => DomainKind::StatsUpdate,
            Self::ActivityNew => DomainKind::Activity,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| format!("unknown event kind: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainKind {
    Message,
    Interview,
    Feedback,
    StatusChange,
    StatsUpdate,
    Activity,
}

// ---------------------------------------------------------------------------
// Domain event
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MalformedEvent {
    #[error("{kind} event is missing a usable id")]
    MissingId { kind: EventKind },
    #[error("{kind} event payload is not an object")]
    NotAnObject { kind: EventKind },
    #[error("{kind} event payload does not decode: {reason}")]
    Decode { kind: EventKind, reason: String },
}

/// A channel event with its identity pulled out of the payload.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub source: EventKind,
    pub kind: DomainKind,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    /// Validate the identity fields of a raw channel event.
    ///
    /// The id is read from `id` or `_id` (strings or numbers); status changes
    /// may name it `applicationId`. The timestamp is read from `timestamp`,
    /// `createdAt` or `updatedAt` and falls back to the receipt time. Stats
    /// updates carry no entity id and get a per-delivery one.
    pub fn from_channel(event: &ChannelEvent) -> Result<Self, MalformedEvent> {
        let object = event
            .payload
            .as_object()
            .ok_or(MalformedEvent::NotAnObject { kind: event.kind })?;

        let id_keys: &[&str] = match event.kind {
            EventKind::ApplicationStatus => &["id", "_id", "applicationId"],
            _ => &["id", "_id"],
        };
        let id = id_keys
            .iter()
            .filter_map(|key| object.get(*key))
            .find_map(|value| match value {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        let id = match (id, event.kind) {
            (Some(id), _) => id,
            (None, EventKind::StatsUpdate) => format!("stats:{}", event.seq),
            (None, kind) => return Err(MalformedEvent::MissingId { kind }),
        };

        let timestamp = ["timestamp", "createdAt", "updatedAt"]
            .iter()
            .filter_map(|key| object.get(*key).and_then(|value| value.as_str()))
            .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or(event.received_at);

        Ok(Self {
            source: event.kind,
            kind: event.kind.domain_kind(),
            id,
            timestamp,
            payload: event.payload.clone(),
        })
    }

    /// Decode the payload into a record or patch type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, MalformedEvent> {
        serde_json::from_value(self.payload.clone()).map_err(|error| MalformedEvent::Decode {
            kind: self.source,
            reason: error.to_string(),
        })
    }
}
