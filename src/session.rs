//! Session lifecycle: credential, REST client, and the shared event channel.

use std::sync::Arc;

use crate::api::{ApiError, HttpPortalApi, PortalApi};
use crate::bus::EventChannel;
use crate::config::PortalConfig;

#[derive(Clone)]
pub struct Credential {
    pub token: String,
    pub user_id: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Everything a mounted view needs from the signed-in session.
///
/// Created on login and torn down with [`SessionContext::logout`]. Views only
/// borrow the channel to subscribe; closing it is reserved to the session.
pub struct SessionContext {
    config: PortalConfig,
    credential: Option<Credential>,
    api: Arc<dyn PortalApi>,
    channel: Option<Arc<EventChannel>>,
}

impl SessionContext {
    /// Build a session against the configured HTTP API. Without a valid
    /// credential the session is anonymous and has no event channel.
    pub fn init(config: PortalConfig, credential: Option<Credential>) -> Result<Self, ApiError> {
        let token = credential
            .as_ref()
            .filter(|credential| credential.is_valid())
            .map(|credential| credential.token.clone());
        let api: Arc<dyn PortalApi> = Arc::new(HttpPortalApi::new(&config, token)?);
        Ok(Self::with_api(config, credential, api))
    }

    /// Build a session over any REST collaborator.
    pub fn with_api(
        config: PortalConfig,
        credential: Option<Credential>,
        api: Arc<dyn PortalApi>,
    ) -> Self {
        let credential = credential.filter(|credential| credential.is_valid());
        let channel = EventChannel::connect(credential.as_ref(), config.channel_capacity);
        if channel.is_none() {
            tracing::info!("anonymous session, live updates disabled");
        }
        Self {
            config,
            credential,
            api,
            channel,
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn api(&self) -> Arc<dyn PortalApi> {
        self.api.clone()
    }

    /// The live connection, if any. `None` is a normal state.
    pub fn channel(&self) -> Option<&Arc<EventChannel>> {
        self.channel.as_ref()
    }

    /// Tear the session down: disconnect the channel (flushing every
    /// subscription) and forget the credential.
    pub fn logout(&mut self) {
        if let Some(channel) = self.channel.take() {
            let flushed = channel.disconnect();
            tracing::info!("logged out, flushed {flushed} live subscriptions");
        }
        self.credential = None;
    }

    /// Sign in again. Always opens a fresh connection; nothing from a previous
    /// connection is resumed.
    pub fn login(&mut self, credential: Credential) -> Result<(), ApiError> {
        self.logout();
        let token = credential.is_valid().then(|| credential.token.clone());
        self.api = Arc::new(HttpPortalApi::new(&self.config, token)?);
        self.channel = EventChannel::connect(Some(&credential), self.config.channel_capacity);
        if credential.is_valid() {
            self.credential = Some(credential);
        }
        Ok(())
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.disconnect();
        }
    }
}
