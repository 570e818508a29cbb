//! REST collaborator: the `PortalApi` seam and its reqwest implementation.

mod client;
pub mod error;
pub mod types;

pub use client::HttpPortalApi;
pub use error::ApiError;
pub use types::{MessageDraft, PortalApi};
