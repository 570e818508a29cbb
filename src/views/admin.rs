use std::sync::Arc;

use crate::api::PortalApi;
use crate::bus::{DomainEvent, EventChannel, EventKind, MalformedEvent};
use crate::core::{Activity, AdminStats, Delta, StatsPatch, ADMIN_STATS_ID};
use crate::session::SessionContext;

use super::live_view::{insert_decoder, LiveView, LoadState, ViewError};

/// `stats:update` carries counters, not an entity; it always targets the one
/// stats record.
fn stats_decoder(event: &DomainEvent) -> Result<Delta<AdminStats>, MalformedEvent> {
    event.decode::<StatsPatch>().map(|patch| Delta::Update {
        key: ADMIN_STATS_ID.to_string(),
        patch,
    })
}

/// Admin overview: platform counters plus the recent-activity log.
pub struct AdminDashboard {
    api: Arc<dyn PortalApi>,
    stats: LiveView<AdminStats>,
    activity: LiveView<Activity>,
}

impl AdminDashboard {
    pub fn new(api: Arc<dyn PortalApi>, channel: Option<&Arc<EventChannel>>) -> Self {
        let stats = LiveView::new("admin stats");
        let activity = LiveView::new("admin activity");
        if let Some(channel) = channel {
            stats.listen(channel, EventKind::StatsUpdate, stats_decoder);
            activity.listen(channel, EventKind::ActivityNew, insert_decoder::<Activity>());
        }
        Self {
            api,
            stats,
            activity,
        }
    }

    pub async fn mount(session: &SessionContext) -> Self {
        let dashboard = Self::new(session.api(), session.channel());
        if let Err(error) = dashboard.reload().await {
            tracing::debug!("admin dashboard mounted without data: {error}");
        }
        dashboard
    }

    /// Load stats and activity concurrently. Each half keeps its own load
    /// state; the first failure is returned.
    pub async fn reload(&self) -> Result<(), ViewError> {
        let stats_fetch = async { self.api.admin_stats().await.map(|stats| vec![stats]) };
        let (stats, activity) = tokio::join!(
            self.stats.load(stats_fetch),
            self.activity.load(self.api.recent_activity()),
        );
        stats?;
        activity?;
        Ok(())
    }

    /// `None` until the first successful load.
    pub fn stats(&self) -> Option<AdminStats> {
        self.stats.get(ADMIN_STATS_ID)
    }

    pub fn recent_activity(&self, limit: usize) -> Vec<Activity> {
        let mut activity = self.activity.records();
        activity.truncate(limit);
        activity
    }

    pub fn stats_state(&self) -> LoadState {
        self.stats.load_state()
    }

    pub fn activity_state(&self) -> LoadState {
        self.activity.load_state()
    }

    pub fn unmount(&self) {
        self.stats.unmount();
        self.activity.unmount();
    }
}
