//! Shared fixtures for view tests: an in-memory REST collaborator plus record
//! builders.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use crate::api::{ApiError, MessageDraft, PortalApi};
use crate::bus::EventChannel;
use crate::core::{Activity, AdminStats, Application, ApplicationStatus, Feedback, Interview, Message};
use crate::session::Credential;

/// Fixed epoch so fixture timestamps are readable as small offsets.
pub(crate) fn ts(offset_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
}

pub(crate) fn connected_channel() -> Arc<EventChannel> {
    let credential = Credential::new("test-token", Some("u-1".to_string()));
    EventChannel::connect(Some(&credential), 64).expect("signed-in channel")
}

/// Poll `condition` until it holds; listener tasks deliver asynchronously.
pub(crate) async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub(crate) fn message(id: &str, at: i64, read: bool) -> Message {
    Message {
        id: id.to_string(),
        sender_id: "u-2".to_string(),
        sender_name: "Acme HR".to_string(),
        receiver_id: "u-1".to_string(),
        content: format!("message {id}"),
        timestamp: ts(at),
        read,
        job_id: None,
    }
}

pub(crate) fn interview(id: &str, date: DateTime<Utc>) -> Interview {
    Interview {
        id: id.to_string(),
        job_id: "job-1".to_string(),
        job_title: "Backend Engineer".to_string(),
        employer_name: "Acme".to_string(),
        job_seeker_name: "Ana".to_string(),
        date,
        location: None,
        notes: None,
        status: None,
        job_seeker_confirmed: None,
        created_at: None,
        read: false,
    }
}

pub(crate) fn feedback(id: &str, at: i64, read: bool) -> Feedback {
    Feedback {
        id: id.to_string(),
        application_id: None,
        job_title: "Backend Engineer".to_string(),
        employer_name: "Acme".to_string(),
        comment: "Strong systems background".to_string(),
        rating: Some(4),
        timestamp: ts(at),
        read,
    }
}

pub(crate) fn application(id: &str, job_id: &str, status: ApplicationStatus, at: i64) -> Application {
    Application {
        id: id.to_string(),
        job_id: job_id.to_string(),
        job_title: "Backend Engineer".to_string(),
        applicant_name: format!("applicant {id}"),
        status,
        applied_at: ts(at),
    }
}

pub(crate) fn activity(id: &str, at: i64) -> Activity {
    Activity {
        id: id.to_string(),
        kind: "user:registered".to_string(),
        description: format!("activity {id}"),
        timestamp: ts(at),
    }
}

/// In-memory [`PortalApi`]. Fetches can be failed per collection or held on a
/// [`Notify`]; mutations can be failed globally. Every mutation is recorded,
/// including failed ones.
#[derive(Default)]
pub(crate) struct MockPortalApi {
    messages: Mutex<Vec<Message>>,
    interviews: Mutex<Vec<Interview>>,
    feedback: Mutex<Vec<Feedback>>,
    applications: Mutex<Vec<Application>>,
    stats: Mutex<AdminStats>,
    activity: Mutex<Vec<Activity>>,
    failing_fetches: Mutex<HashSet<&'static str>>,
    fail_mutations: AtomicBool,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    sent: AtomicU64,
}

impl MockPortalApi {
    pub(crate) fn set_messages(&self, records: Vec<Message>) {
        *self.messages.lock().unwrap() = records;
    }

    pub(crate) fn set_interviews(&self, records: Vec<Interview>) {
        *self.interviews.lock().unwrap() = records;
    }

    pub(crate) fn set_feedback(&self, records: Vec<Feedback>) {
        *self.feedback.lock().unwrap() = records;
    }

    pub(crate) fn set_applications(&self, records: Vec<Application>) {
        *self.applications.lock().unwrap() = records;
    }

    pub(crate) fn set_stats(&self, stats: AdminStats) {
        *self.stats.lock().unwrap() = stats;
    }

    pub(crate) fn set_activity(&self, records: Vec<Activity>) {
        *self.activity.lock().unwrap() = records;
    }

    /// `collection` is one of messages, interviews, feedback, applications,
    /// stats, activity.
    pub(crate) fn fail_fetch(&self, collection: &'static str) {
        self.failing_fetches.lock().unwrap().insert(collection);
    }

    pub(crate) fn fail_mutations(&self) {
        self.fail_mutations.store(true, Ordering::SeqCst);
    }

    /// Park every fetch until `gate` is notified.
    pub(crate) fn hold_fetches(&self, gate: Arc<Notify>) {
        *self.fetch_gate.lock().unwrap() = Some(gate);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn fetch<T: Clone>(&self, collection: &'static str, source: &Mutex<Vec<T>>) -> Result<Vec<T>, ApiError> {
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing_fetches.lock().unwrap().contains(collection) {
            return Err(ApiError::Status {
                endpoint: format!("/{collection}"),
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(source.lock().unwrap().clone())
    }

    fn mutate(&self, call: String) -> Result<(), ApiError> {
        let endpoint = call.clone();
        self.calls.lock().unwrap().push(call);
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                endpoint,
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PortalApi for MockPortalApi {
    async fn list_messages(&self) -> Result<Vec<Message>, ApiError> {
        self.fetch("messages", &self.messages).await
    }

    async fn send_message(&self, draft: &MessageDraft) -> Result<Message, ApiError> {
        self.mutate(format!("send_message:{}", draft.receiver_id))?;
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id: format!("sent-{n}"),
            sender_id: "u-1".to_string(),
            sender_name: "Me".to_string(),
            receiver_id: draft.receiver_id.clone(),
            content: draft.content.clone(),
            timestamp: ts(1_000 + n as i64),
            read: true,
            job_id: draft.job_id.clone(),
        })
    }

    async fn mark_message_read(&self, id: &str) -> Result<(), ApiError> {
        self.mutate(format!("mark_message_read:{id}"))
    }

    async fn list_interviews(&self) -> Result<Vec<Interview>, ApiError> {
        self.fetch("interviews", &self.interviews).await
    }

    async fn respond_to_interview(&self, id: &str, confirmed: bool) -> Result<(), ApiError> {
        self.mutate(format!("respond_to_interview:{id}:{confirmed}"))
    }

    async fn mark_interview_read(&self, id: &str) -> Result<(), ApiError> {
        self.mutate(format!("mark_interview_read:{id}"))
    }

    async fn list_feedback(&self) -> Result<Vec<Feedback>, ApiError> {
        self.fetch("feedback", &self.feedback).await
    }

    async fn mark_feedback_read(&self, id: &str) -> Result<(), ApiError> {
        self.mutate(format!("mark_feedback_read:{id}"))
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ApiError> {
        self.fetch("applications", &self.applications).await
    }

    async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
    ) -> Result<(), ApiError> {
        self.mutate(format!("update_application_status:{id}:{status}"))
    }

    async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        let stats = Mutex::new(vec![self.stats.lock().unwrap().clone()]);
        let mut stats = self.fetch("stats", &stats).await?;
        Ok(stats.remove(0))
    }

    async fn recent_activity(&self) -> Result<Vec<Activity>, ApiError> {
        self.fetch("activity", &self.activity).await
    }
}
