use std::sync::Arc;

use crate::api::PortalApi;
use crate::bus::{EventChannel, EventKind};
use crate::core::{Application, ApplicationStatus};
use crate::session::SessionContext;

use super::live_view::{patch_decoder, LiveView, LoadState, ViewError};

/// Applications visible to the user (their own, or those received by an
/// employer), most recent first. Status changes arrive as field-level patches.
pub struct ApplicationsView {
    api: Arc<dyn PortalApi>,
    view: LiveView<Application>,
}

impl ApplicationsView {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let view = LiveView::new("applications");
        if let Some(channel) = channel {
            view.listen(
                channel,
                EventKind::ApplicationStatus,
                patch_decoder::<Application>(),
            );
        }
        Self { api, view }
    }

    pub async fn mount(session: &SessionContext) -> Self {
        let view = Self::new(session.api(), session.channel());
        if let Err(error) = view.reload().await {
            tracing::debug!("applications mounted without data: {error}");
        }
        view
    }

    pub async fn reload(&self) -> Result<usize, ViewError> {
        self.view.load(self.api.list_applications()).await
    }

    pub fn applications(&self) -> Vec<Application> {
        self.view.records()
    }

    pub fn for_job(&self, job_id: &str) -> Vec<Application> {
        self.view.filtered(|application| application.job_id == job_id)
    }

    pub fn applicant_count(&self, job_id: &str) -> usize {
        self.view.count(|application| application.job_id == job_id)
    }

    pub fn count_with_status(&self, status: ApplicationStatus) -> usize {
        self.view.count(|application| application.status == status)
    }

    /// Employer decision on an application. Applied locally before the REST
    /// call and kept if it fails.
    pub async fn update_status(&self, id: &str, status: ApplicationStatus) -> Result<(), ViewError> {
        self.view
            .optimistic(
                id,
                format!("set application {id} to {status}"),
                |application| application.status = status,
                self.api.update_application_status(id, status),
            )
            .await
    }

    pub fn load_state(&self) -> LoadState {
        self.view.load_state()
    }

    pub fn view(&self) -> &LiveView<Application> {
        &self.view
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }
}
