use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::api::{MessageDraft, PortalApi};
use crate::bus::{EventChannel, EventKind};
use crate::core::{Delta, Message, PENDING_MESSAGE_PREFIX};
use crate::session::SessionContext;

use super::live_view::{insert_decoder, LiveView, LoadState, ViewError};

/// Inbox for the signed-in user, newest first.
pub struct MessagesView {
    api: Arc<dyn PortalApi>,
    user_id: Option<String>,
    view: LiveView<Message>,
}

impl MessagesView {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let view = LiveView::new("messages");
        if let Some(channel) = channel {
            view.listen(channel, EventKind::MessageNew, insert_decoder::<Message>());
        }
        Self {
            api,
            user_id: None,
            view,
        }
    }

    /// Subscribe, then load. A failed load is kept in [`Self::load_state`].
    pub async fn mount(session: &SessionContext) -> Self {
        let mut view = Self::new(session.api(), session.channel());
        view.user_id = session
            .credential()
            .and_then(|credential| credential.user_id.clone());
        if let Err(error) = view.reload().await {
            tracing::debug!("messages mounted without data: {error}");
        }
        view
    }

    pub async fn reload(&self) -> Result<usize, ViewError> {
        self.view.load(self.api.list_messages()).await
    }

    pub fn messages(&self) -> Vec<Message> {
        self.view.records()
    }

    pub fn unread_count(&self) -> usize {
        self.view.unread_count()
    }

    /// Messages exchanged with `user_id`, in either direction.
    pub fn conversation(&self, user_id: &str) -> Vec<Message> {
        self.view
            .filtered(|message| message.sender_id == user_id || message.receiver_id == user_id)
    }

    /// Send a message optimistically.
    ///
    /// A provisional copy under a `pending-` id is shown at once. On success it
    /// is swapped for the stored record, which the echoed `message:new` then
    /// dedups against. On failure the provisional copy stays.
    pub async fn send(&self, draft: MessageDraft) -> Result<Message, ViewError> {
        if !self.view.is_mounted() {
            return Err(ViewError::Unmounted {
                feature: self.view.feature(),
            });
        }
        let provisional = Message {
            id: format!("{PENDING_MESSAGE_PREFIX}{}", Uuid::new_v4()),
            sender_id: self.user_id.clone().unwrap_or_default(),
            sender_name: String::new(),
            receiver_id: draft.receiver_id.clone(),
            content: draft.content.clone(),
            timestamp: Utc::now(),
            read: true,
            job_id: draft.job_id.clone(),
        };
        let pending_id = provisional.id.clone();
        self.view.apply(Delta::Insert(provisional));

        match self.api.send_message(&draft).await {
            Ok(message) => {
                self.view.swap(&pending_id, message.clone());
                Ok(message)
            }
            Err(source) => {
                tracing::warn!(
                    "messages: send to {} failed, keeping {pending_id}: {source}",
                    draft.receiver_id
                );
                Err(ViewError::Mutation {
                    action: "send message".to_string(),
                    source,
                })
            }
        }
    }

    pub async fn mark_read(&self, id: &str) -> Result<bool, ViewError> {
        self.view
            .mark_read(id, || self.api.mark_message_read(id))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<usize, ViewError> {
        self.view
            .mark_all_read(|message| {
                let api = self.api.clone();
                async move { api.mark_message_read(&message.id).await }
            })
            .await
    }

    pub fn load_state(&self) -> LoadState {
        self.view.load_state()
    }

    pub fn view(&self) -> &LiveView<Message> {
        &self.view
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }
}
