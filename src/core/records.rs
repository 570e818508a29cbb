//! Domain records held in client snapshots, as the portal API serializes them.
//!
//! Keys are camelCase and MongoDB-style `_id` is accepted for `id`.

use std::cmp::Ordering;
use std::convert::Infallible;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::snapshot::SnapshotRecord;

/// Ids arrive as strings or as numbers; both are kept as text.
fn record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Records carrying a `read` flag that only ever moves from unread to read
/// on the client.
pub trait ReadFlag {
    fn is_read(&self) -> bool;
    fn set_read(&mut self);
}

macro_rules! impl_read_flag {
    ($($record:ty),+ $(,)?) => {
        $(
            impl ReadFlag for $record {
                fn is_read(&self) -> bool {
                    self.read
                }

                fn set_read(&mut self) {
                    self.read = true;
                }
            }
        )+
    };
}

impl_read_flag!(Message, Interview, Feedback);

/// Patch for records whose only mutable field is the read flag. Applying it
/// can mark a record read but never unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPatch {
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "_id", deserialize_with = "record_id")]
    pub id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Id prefix of a sent message the server has not stored yet.
pub const PENDING_MESSAGE_PREFIX: &str = "pending-";

impl Message {
    pub fn is_pending(&self) -> bool {
        self.id.starts_with(PENDING_MESSAGE_PREFIX)
    }
}

impl SnapshotRecord for Message {
    type Patch = ReadPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }

    fn apply_patch(&mut self, patch: ReadPatch) {
        self.read |= patch.read;
    }
}

// ---------------------------------------------------------------------------
// Interviews
// ---------------------------------------------------------------------------

/// Job seeker response to an interview invitation. `Confirmed` and `Declined`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationState {
    Unconfirmed,
    Confirmed,
    Declined,
}

impl ConfirmationState {
    pub const fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unconfirmed,
            Some(true) => Self::Confirmed,
            Some(false) => Self::Declined,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unconfirmed)
    }
}

impl std::fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unconfirmed => "unconfirmed",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    #[serde(alias = "_id", deserialize_with = "record_id")]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub employer_name: String,
    #[serde(default)]
    pub job_seeker_name: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub job_seeker_confirmed: Option<bool>,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl Interview {
    pub fn confirmation(&self) -> ConfirmationState {
        ConfirmationState::from_flag(self.job_seeker_confirmed)
    }

    /// Upcoming iff scheduled strictly after `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date > now
    }

    /// When the invitation was issued; falls back to the interview date.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(self.date)
    }
}

/// Field-level changes carried by `interview:updated`. Absent fields are left
/// untouched. `read` can only move to true, and `jobSeekerConfirmed` only
/// applies while the interview is still unconfirmed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPatch {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub job_seeker_confirmed: Option<bool>,
    #[serde(default)]
    pub read: Option<bool>,
}

impl SnapshotRecord for Interview {
    type Patch = InterviewPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        a.date.cmp(&b.date)
    }

    fn apply_patch(&mut self, patch: InterviewPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some(confirmed) = patch.job_seeker_confirmed {
            if !self.confirmation().is_terminal() {
                self.job_seeker_confirmed = Some(confirmed);
            }
        }
        if patch.read == Some(true) {
            self.read = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(alias = "_id", deserialize_with = "record_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub employer_name: String,
    #[serde(default, alias = "content")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl SnapshotRecord for Feedback {
    type Patch = ReadPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }

    fn apply_patch(&mut self, patch: ReadPatch) {
        self.read |= patch.read;
    }
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    #[serde(alias = "reviewed")]
    Reviewing,
    Shortlisted,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewing => "reviewing",
            Self::Shortlisted => "shortlisted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(alias = "_id", deserialize_with = "record_id")]
    pub id: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub applicant_name: String,
    pub status: ApplicationStatus,
    #[serde(alias = "createdAt")]
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    pub status: ApplicationStatus,
}

impl SnapshotRecord for Application {
    type Patch = ApplicationPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        b.applied_at.cmp(&a.applied_at)
    }

    fn apply_patch(&mut self, patch: ApplicationPatch) {
        self.status = patch.status;
    }
}

// ---------------------------------------------------------------------------
// Admin dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(alias = "_id", deserialize_with = "record_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, alias = "message")]
    pub description: String,
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
}

impl SnapshotRecord for Activity {
    type Patch = Infallible;

    fn id(&self) -> &str {
        &self.id
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        b.timestamp.cmp(&a.timestamp)
    }

    fn apply_patch(&mut self, patch: Infallible) {
        match patch {}
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_job_seekers: u64,
    #[serde(default)]
    pub total_employers: u64,
    #[serde(default)]
    pub total_jobs: u64,
    #[serde(default)]
    pub active_jobs: u64,
    #[serde(default)]
    pub total_applications: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    #[serde(default)]
    pub total_users: Option<u64>,
    #[serde(default)]
    pub total_job_seekers: Option<u64>,
    #[serde(default)]
    pub total_employers: Option<u64>,
    #[serde(default)]
    pub total_jobs: Option<u64>,
    #[serde(default)]
    pub active_jobs: Option<u64>,
    #[serde(default)]
    pub total_applications: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The dashboard holds a single stats record under this fixed identity.
pub const ADMIN_STATS_ID: &str = "admin-stats";

impl SnapshotRecord for AdminStats {
    type Patch = StatsPatch;

    fn id(&self) -> &str {
        ADMIN_STATS_ID
    }

    fn order(_: &Self, _: &Self) -> Ordering {
        Ordering::Equal
    }

    fn apply_patch(&mut self, patch: StatsPatch) {
        let fields = [
            (&mut self.total_users, patch.total_users),
            (&mut self.total_job_seekers, patch.total_job_seekers),
            (&mut self.total_employers, patch.total_employers),
            (&mut self.total_jobs, patch.total_jobs),
            (&mut self.active_jobs, patch.active_jobs),
            (&mut self.total_applications, patch.total_applications),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
    }
}
