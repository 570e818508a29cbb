//! Unified notification feed over messages, interviews and feedback.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::api::{ApiError, PortalApi};
use crate::bus::{DomainEvent, EventChannel, EventKind, MalformedEvent};
use crate::core::{Delta, Feedback, Interview, Message, Notification, NotificationKind};
use crate::session::SessionContext;

use super::live_view::{LiveView, LoadState, ViewError};

/// Decode a creation event into a feed envelope. Live entries always start
/// unread.
fn envelope_decoder<T, F>(
    to_envelope: F,
) -> impl Fn(&DomainEvent) -> Result<Delta<Notification>, MalformedEvent> + Send + Sync
where
    T: DeserializeOwned,
    F: Fn(T, &DomainEvent) -> Notification + Send + Sync,
{
    move |event: &DomainEvent| {
        event.decode::<T>().map(|record| {
            let mut envelope = to_envelope(record, event);
            envelope.read = false;
            Delta::Insert(envelope)
        })
    }
}

/// A pushed invitation without `createdAt` is stamped with the event time,
/// not the interview date.
fn live_interview_envelope(mut interview: Interview, event: &DomainEvent) -> Notification {
    interview.created_at.get_or_insert(event.timestamp);
    Notification::from_interview(&interview)
}

async fn mark_source_read(api: &dyn PortalApi, kind: NotificationKind, id: &str) -> Result<(), ApiError> {
    match kind {
        NotificationKind::Message => api.mark_message_read(id).await,
        NotificationKind::Interview => api.mark_interview_read(id).await,
        NotificationKind::Feedback => api.mark_feedback_read(id).await,
    }
}

/// Newest-first feed combining the three notification sources.
pub struct NotificationFeed {
    api: Arc<dyn PortalApi>,
    view: LiveView<Notification>,
}

impl NotificationFeed {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let view = LiveView::new("notifications");
        if let Some(channel) = channel {
            view.listen(
                channel,
                EventKind::MessageNew,
                envelope_decoder(|message: Message, _: &DomainEvent| Notification::from_message(&message)),
            );
            view.listen(
                channel,
                EventKind::InterviewScheduled,
                envelope_decoder(live_interview_envelope),
            );
            view.listen(
                channel,
                EventKind::FeedbackNew,
                envelope_decoder(|feedback: Feedback, _: &DomainEvent| {
                    Notification::from_feedback(&feedback)
                }),
            );
        }
        Self { api, view }
    }

    pub async fn mount(session: &SessionContext) -> Self {
        let feed = Self::new(session.api(), session.channel());
        if let Err(error) = feed.reload().await {
            tracing::debug!("notifications mounted without data: {error}");
        }
        feed
    }

    /// Fetch the three sources concurrently and replace the feed with their
    /// union. Fails only when every source fails; otherwise missing sources
    /// are reported through [`LoadState::Partial`].
    pub async fn reload(&self) -> Result<usize, ViewError> {
        let mut failed: Vec<&'static str> = Vec::new();
        let fetch = async {
            let (messages, interviews, feedback) = tokio::join!(
                self.api.list_messages(),
                self.api.list_interviews(),
                self.api.list_feedback(),
            );

            let mut envelopes = Vec::new();
            let mut first_error = None;
            match messages {
                Ok(records) => envelopes.extend(records.iter().map(Notification::from_message)),
                Err(error) => {
                    failed.push("messages");
                    first_error.get_or_insert(error);
                }
            }
            match interviews {
                Ok(records) => envelopes.extend(records.iter().map(Notification::from_interview)),
                Err(error) => {
                    failed.push("interviews");
                    first_error.get_or_insert(error);
                }
            }
            match feedback {
                Ok(records) => envelopes.extend(records.iter().map(Notification::from_feedback)),
                Err(error) => {
                    failed.push("feedback");
                    first_error.get_or_insert(error);
                }
            }

            match first_error {
                Some(error) if failed.len() == 3 => Err(error),
                _ => Ok(envelopes),
            }
        };

        let count = self.view.load(fetch).await?;
        if !failed.is_empty() {
            let error = format!("failed to load {}", failed.join(", "));
            tracing::warn!("notifications: {error}");
            self.view.mark_partial(error);
        }
        Ok(count)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.view.records()
    }

    pub fn unread_count(&self) -> usize {
        self.view.unread_count()
    }

    pub async fn mark_read(&self, kind: NotificationKind, id: &str) -> Result<bool, ViewError> {
        let key = Notification::key_for(kind, id);
        self.view
            .mark_read(&key, || mark_source_read(self.api.as_ref(), kind, id))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<usize, ViewError> {
        self.view
            .mark_all_read(|envelope| {
                let api = self.api.clone();
                async move { mark_source_read(api.as_ref(), envelope.kind, &envelope.id).await }
            })
            .await
    }

    pub fn load_state(&self) -> LoadState {
        self.view.load_state()
    }

    pub fn view(&self) -> &LiveView<Notification> {
        &self.view
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }
}
