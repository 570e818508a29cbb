use std::sync::Arc;

use crate::api::PortalApi;
use crate::bus::{EventChannel, EventKind};
use crate::core::Feedback;
use crate::session::SessionContext;

use super::live_view::{insert_decoder, LiveView, LoadState, ViewError};

/// Employer feedback on the user's applications, newest first.
pub struct FeedbackView {
    api: Arc<dyn PortalApi>,
    view: LiveView<Feedback>,
}

impl FeedbackView {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let view = LiveView::new("feedback");
        if let Some(channel) = channel {
            view.listen(channel, EventKind::FeedbackNew, insert_decoder::<Feedback>());
        }
        Self { api, view }
    }

    pub async fn mount(session: &SessionContext) -> Self {
        let view = Self::new(session.api(), session.channel());
        if let Err(error) = view.reload().await {
            tracing::debug!("feedback mounted without data: {error}");
        }
        view
    }

    pub async fn reload(&self) -> Result<usize, ViewError> {
        self.view.load(self.api.list_feedback()).await
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.view.records()
    }

    pub fn unread_count(&self) -> usize {
        self.view.unread_count()
    }

    pub async fn mark_read(&self, id: &str) -> Result<bool, ViewError> {
        self.view
            .mark_read(id, || self.api.mark_feedback_read(id))
            .await
    }

    pub async fn mark_all_read(&self) -> Result<usize, ViewError> {
        self.view
            .mark_all_read(|feedback| {
                let api = self.api.clone();
                async move { api.mark_feedback_read(&feedback.id).await }
            })
            .await
    }

    pub fn load_state(&self) -> LoadState {
        self.view.load_state()
    }

    pub fn view(&self) -> &LiveView<Feedback> {
        &self.view
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }
}
