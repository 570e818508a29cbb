//! Feature views mounted against a [`SessionContext`](crate::session::SessionContext).
//!
//! Each view owns one or more [`LiveView`] snapshots: loaded from REST on
//! mount, merged with live channel events until unmount.

pub mod admin;
pub mod applications;
pub mod feedback;
pub mod interviews;
pub mod live_view;
pub mod messages;
pub mod notifications;

pub use admin::AdminDashboard;
pub use applications::ApplicationsView;
pub use feedback::FeedbackView;
pub use interviews::InterviewsView;
pub use live_view::{insert_decoder, patch_decoder, Decoder, LiveView, LoadState, ViewError};
pub use messages::MessagesView;
pub use notifications::NotificationFeed;
