//! Domain records and the snapshot primitive shared by every live view.

pub mod notification;
pub mod records;
pub mod snapshot;

pub use notification::{Notification, NotificationKind};
pub use records::{
    Activity, AdminStats, Application, ApplicationPatch, ApplicationStatus, ConfirmationState,
    Feedback, Interview, InterviewPatch, Message, ReadFlag, ReadPatch, StatsPatch, ADMIN_STATS_ID,
    PENDING_MESSAGE_PREFIX,
};
pub use snapshot::{Delta, MergeOutcome, Snapshot, SnapshotRecord};
