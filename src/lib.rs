//! Live job-portal client state.
//!
//! Every dashboard feature (messages, interviews, feedback, applications,
//! admin stats and the unified notification feed) keeps a client-side
//! snapshot that is loaded from the portal REST API and then merged with
//! domain events pushed over the session's event channel.
//!
//! # Architecture
//!
//! - `session`: credential, REST client and event channel for one sign-in
//! - `bus`: event channel, subscriptions and event identity validation
//! - `core`: domain records and the generic snapshot reconciler
//! - `api`: REST collaborator trait and its HTTP implementation
//! - `views`: per-feature live views built on the snapshot
//! - `config` / `logging`: ambient setup for binaries and embedders

pub mod api;
pub mod bus;
pub mod config;
pub mod core;
pub mod logging;
pub mod session;
pub mod views;

#[cfg(test)]
mod testing;

pub use api::{ApiError, HttpPortalApi, MessageDraft, PortalApi};
pub use bus::{ChannelEvent, DomainEvent, EventChannel, EventKind, Subscription};
pub use config::{ConfigError, PortalConfig};
pub use session::{Credential, SessionContext};
pub use views::{
    AdminDashboard, ApplicationsView, FeedbackView, InterviewsView, LoadState, MessagesView,
    NotificationFeed, ViewError,
};
