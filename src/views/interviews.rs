use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::PortalApi;
use crate::bus::{EventChannel, EventKind};
use crate::core::{ConfirmationState, Interview};
use crate::session::SessionContext;

use super::live_view::{insert_decoder, patch_decoder, LiveView, LoadState, ViewError};

/// Scheduled interviews, soonest first.
///
/// `interview:scheduled` inserts, `interview:updated` patches fields of a
/// known interview. Confirming or declining is a one-way transition out of
/// `unconfirmed`.
pub struct InterviewsView {
    api: Arc<dyn PortalApi>,
    view: LiveView<Interview>,
}

impl InterviewsView {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let view = LiveView::new("interviews");
        if let Some(channel) = channel {
            view.listen(
                channel,
                EventKind::InterviewScheduled,
                insert_decoder::<Interview>(),
            );
            view.listen(channel, EventKind::InterviewUpdated, patch_decoder::<Interview>());
        }
        Self { api, view }
    }

    pub async fn mount(session: &SessionContext) -> Self {
        let view = Self::new(session.api(), session.channel());
        if let Err(error) = view.reload().await {
            tracing::debug!("interviews mounted without data: {error}");
        }
        view
    }

    pub async fn reload(&self) -> Result<usize, ViewError> {
        self.view.load(self.api.list_interviews()).await
    }

    pub fn interviews(&self) -> Vec<Interview> {
        self.view.records()
    }

    /// Interviews dated strictly after `now`. Evaluated on every call, so an
    /// interview drops out as soon as its date passes.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Interview> {
        self.view.filtered(|interview| interview.is_upcoming(now))
    }

    pub fn upcoming_now(&self) -> Vec<Interview> {
        self.upcoming(Utc::now())
    }

    /// Upcoming interviews still waiting for an answer.
    pub fn awaiting_response(&self, now: DateTime<Utc>) -> Vec<Interview> {
        self.view.filtered(|interview| {
            interview.is_upcoming(now) && interview.confirmation() == ConfirmationState::Unconfirmed
        })
    }

    pub fn unread_count(&self) -> usize {
        self.view.unread_count()
    }

    pub async fn confirm(&self, id: &str) -> Result<(), ViewError> {
        self.respond(id, true).await
    }

    pub async fn decline(&self, id: &str) -> Result<(), ViewError> {
        self.respond(id, false).await
    }

    async fn respond(&self, id: &str, confirmed: bool) -> Result<(), ViewError> {
        let interview = self.view.get(id).ok_or_else(|| ViewError::NotFound {
            feature: self.view.feature(),
            key: id.to_string(),
        })?;
        let state = interview.confirmation();
        if state.is_terminal() {
            return Err(ViewError::InvalidTransition {
                id: id.to_string(),
                state,
            });
        }

        let action = if confirmed { "confirm" } else { "decline" };
        self.view
            .optimistic(
                id,
                format!("{action} interview {id}"),
                |interview| interview.job_seeker_confirmed = Some(confirmed),
                self.api.respond_to_interview(id, confirmed),
            )
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<bool, ViewError> {
        self.view
            .mark_read(id, || self.api.mark_interview_read(id))
            .await
    }

    pub fn load_state(&self) -> LoadState {
        self.view.load_state()
    }

    pub fn view(&self) -> &LiveView<Interview> {
        &self.view
    }

    pub fn unmount(&self) {
        self.view.unmount();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::core::MergeOutcome;
    use crate::testing::{connected_channel, interview, ts, wait_until, MockPortalApi};

    fn ids(interviews: &[Interview]) -> Vec<&str> {
        interviews.iter().map(|interview| interview.id.as_str()).collect()
    }

    #[tokio::test]
    async fn upcoming_excludes_past_interviews() {
        let now = ts(0);
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![
            interview("i-past", now - Duration::days(1)),
            interview("i-next", now + Duration::days(1)),
        ]);
        let view = InterviewsView::new(api, None);
        view.reload().await.unwrap();

        assert_eq!(ids(&view.upcoming(now)), vec!["i-next"]);
        assert!(view.upcoming(now + Duration::days(2)).is_empty());
        assert_eq!(ids(&view.interviews()), vec!["i-past", "i-next"]);
    }

    #[tokio::test]
    async fn update_event_moves_interview_to_its_new_slot() {
        let channel = connected_channel();
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100)), interview("i-2", ts(200))]);
        let view = InterviewsView::new(api, Some(&channel));
        view.reload().await.unwrap();

        channel.publish(
            EventKind::InterviewUpdated,
            json!({ "id": "i-1", "date": ts(300).to_rfc3339(), "location": "Room 2" }),
        );

        wait_until(|| view.interviews()[0].id == "i-2").await;
        let interviews = view.interviews();
        assert_eq!(ids(&interviews), vec!["i-2", "i-1"]);
        assert_eq!(interviews[1].location.as_deref(), Some("Room 2"));
        assert!(view.view().is_sorted());
    }

    #[tokio::test]
    async fn server_update_answers_an_open_invitation_but_cannot_reopen_it() {
        let channel = connected_channel();
        let api = Arc::new(MockPortalApi::default());
        let mut seen = interview("i-2", ts(200));
        seen.read = true;
        api.set_interviews(vec![interview("i-1", ts(100)), seen]);
        let view = InterviewsView::new(api, Some(&channel));
        view.reload().await.unwrap();
        assert_eq!(view.unread_count(), 1);

        channel.publish(
            EventKind::InterviewUpdated,
            json!({ "id": "i-1", "jobSeekerConfirmed": true, "read": true }),
        );
        channel.publish(
            EventKind::InterviewUpdated,
            json!({ "id": "i-2", "read": false, "notes": "bring portfolio" }),
        );
        wait_until(|| view.interviews()[1].notes.is_some()).await;

        let interviews = view.interviews();
        assert_eq!(interviews[0].confirmation(), ConfirmationState::Confirmed);
        assert!(interviews[1].read, "update events never mark unread");
        assert_eq!(view.unread_count(), 0);

        channel.publish(
            EventKind::InterviewUpdated,
            json!({ "id": "i-1", "jobSeekerConfirmed": false, "location": "Room 5" }),
        );
        wait_until(|| view.interviews()[0].location.is_some()).await;
        assert_eq!(
            view.interviews()[0].confirmation(),
            ConfirmationState::Confirmed
        );
    }

    #[tokio::test]
    async fn update_for_unknown_interview_is_dropped() {
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100))]);
        let view = InterviewsView::new(api, None);
        view.reload().await.unwrap();
        let before = view.interviews();

        let channel = connected_channel();
        let event = channel
            .publish(
                EventKind::InterviewUpdated,
                json!({ "id": "i-404", "status": "cancelled" }),
            )
            .unwrap();
        assert_eq!(
            view.view().apply_event(&event, &patch_decoder::<Interview>()),
            MergeOutcome::Dropped
        );
        assert_eq!(view.interviews(), before);
    }

    #[tokio::test]
    async fn scheduled_event_inserts_in_date_order() {
        let channel = connected_channel();
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100)), interview("i-3", ts(300))]);
        let view = InterviewsView::new(api, Some(&channel));
        view.reload().await.unwrap();

        channel.publish(
            EventKind::InterviewScheduled,
            serde_json::to_value(interview("i-2", ts(200))).unwrap(),
        );

        wait_until(|| view.interviews().len() == 3).await;
        assert_eq!(ids(&view.interviews()), vec!["i-1", "i-2", "i-3"]);
    }

    #[tokio::test]
    async fn confirm_is_optimistic_and_terminal() {
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100))]);
        let view = InterviewsView::new(api.clone(), None);
        view.reload().await.unwrap();

        view.confirm("i-1").await.unwrap();
        assert_eq!(
            view.interviews()[0].confirmation(),
            ConfirmationState::Confirmed
        );

        let again = view.decline("i-1").await;
        assert!(matches!(
            again,
            Err(ViewError::InvalidTransition {
                state: ConfirmationState::Confirmed,
                ..
            })
        ));
        assert_eq!(api.calls(), vec!["respond_to_interview:i-1:true"]);
    }

    #[tokio::test]
    async fn failed_decline_is_not_rolled_back() {
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100))]);
        let view = InterviewsView::new(api.clone(), None);
        view.reload().await.unwrap();
        api.fail_mutations();

        assert!(matches!(
            view.decline("i-1").await,
            Err(ViewError::Mutation { .. })
        ));
        assert_eq!(
            view.interviews()[0].confirmation(),
            ConfirmationState::Declined
        );
    }

    #[tokio::test]
    async fn awaiting_response_skips_answered_interviews() {
        let now = ts(0);
        let api = Arc::new(MockPortalApi::default());
        let mut answered = interview("i-2", now + Duration::hours(2));
        answered.job_seeker_confirmed = Some(true);
        api.set_interviews(vec![interview("i-1", now + Duration::hours(1)), answered]);
        let view = InterviewsView::new(api, None);
        view.reload().await.unwrap();

        assert_eq!(ids(&view.awaiting_response(now)), vec!["i-1"]);
    }

    #[tokio::test]
    async fn mark_read_uses_interview_endpoint() {
        let api = Arc::new(MockPortalApi::default());
        api.set_interviews(vec![interview("i-1", ts(100))]);
        let view = InterviewsView::new(api.clone(), None);
        view.reload().await.unwrap();

        assert!(view.mark_read("i-1").await.unwrap());
        assert!(!view.mark_read("i-1").await.unwrap());
        assert_eq!(view.unread_count(), 0);
        assert_eq!(api.calls(), vec!["mark_interview_read:i-1"]);
    }
}
