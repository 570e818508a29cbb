//! Push event channel for live updates.
//!
//! # Architecture
//!
//! Events flow from transport → EventChannel → per-subscription listeners:
//! - `EventChannel`: one connection per signed-in session, fanned out to per-subscription queues
//! - `Subscription`: observer token; dropping it stops the handler
//! - `event_types`: wire names and the `DomainEvent` identity guard

mod event_channel;
pub mod event_types;

pub use event_channel::{
    ChannelEvent, EventChannel, Subscription, DEFAULT_CHANNEL_CAPACITY,
};
pub use event_types::{DomainEvent, DomainKind, EventKind, MalformedEvent};
