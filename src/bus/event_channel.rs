use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::event_types::EventKind;
use crate::session::Credential;

/// Per-subscriber backlog above which a slow handler is logged.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub seq: i64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Open flag shared between a listener task and its subscription token.
///
/// The listener holds the lock while a handler runs, so closing the gate
/// waits for an in-flight handler. A handler must not drop its own
/// subscription.
type HandlerGate = Arc<Mutex<bool>>;

struct SubscriptionEntry {
    kind: EventKind,
    gate: HandlerGate,
    queue: mpsc::UnboundedSender<ChannelEvent>,
    backlog: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SubscriptionEntry {
    fn cancel(self) {
        *self.gate.lock().expect("handler gate mutex poisoned") = false;
        self.task.abort();
    }
}

type Registry = DashMap<u64, SubscriptionEntry>;

/// One logical push connection for a signed-in session.
///
/// Every subscription owns an unbounded queue drained by its own listener
/// task, so a slow handler never loses events and sees them in delivery
/// order.
pub struct EventChannel {
    connection_id: String,
    open: Mutex<bool>,
    backlog_limit: usize,
    seq: AtomicI64,
    next_subscription: AtomicU64,
    subscriptions: Arc<Registry>,
}

impl EventChannel {
    /// Open a connection for `credential`. Anonymous sessions get no
    /// connection, which callers treat as "no live updates".
    pub fn connect(credential: Option<&Credential>, backlog_limit: usize) -> Option<Arc<Self>> {
        let credential = credential.filter(|credential| credential.is_valid())?;
        let channel = Self {
            connection_id: Uuid::new_v4().to_string(),
            open: Mutex::new(true),
            backlog_limit: backlog_limit.max(1),
            seq: AtomicI64::new(0),
            next_subscription: AtomicU64::new(0),
            subscriptions: Arc::new(DashMap::new()),
        };
        tracing::info!(
            connection_id = %channel.connection_id,
            user_id = credential.user_id.as_deref().unwrap_or("-"),
            "event channel connected"
        );
        Some(Arc::new(channel))
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn is_connected(&self) -> bool {
        *self.open.lock().expect("event channel mutex poisoned")
    }

    /// Hand a raw event from the transport to the channel. Unknown kind names
    /// are dropped.
    pub fn deliver(&self, kind: &str, payload: serde_json::Value) -> Option<ChannelEvent> {
        match kind.parse::<EventKind>() {
            Ok(kind) => self.publish(kind, payload),
            Err(error) => {
                tracing::debug!("ignoring channel event: {error}");
                None
            }
        }
    }

    /// Stamp an event and queue it for every subscriber of its kind.
    pub fn publish(&self, kind: EventKind, payload: serde_json::Value) -> Option<ChannelEvent> {
        // Held across the fan-out so every queue sees events in seq order.
        let open = self.open.lock().expect("event channel mutex poisoned");
        if !*open {
            tracing::debug!("event channel closed, dropping {kind} event");
            return None;
        }

        let event = ChannelEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            kind,
            payload,
            received_at: Utc::now(),
        };
        let mut queued = 0;
        for entry in self.subscriptions.iter().filter(|entry| entry.kind == kind) {
            let depth = entry.backlog.fetch_add(1, Ordering::AcqRel) + 1;
            if entry.queue.send(event.clone()).is_err() {
                entry.backlog.fetch_sub(1, Ordering::AcqRel);
                continue;
            }
            if depth == self.backlog_limit + 1 {
                tracing::warn!(
                    "{kind} subscriber {} is {depth} events behind",
                    entry.key()
                );
            }
            queued += 1;
        }
        if queued == 0 {
            tracing::debug!("no listeners for {kind} event (seq {})", event.seq);
        }
        Some(event)
    }

    /// Register `handler` for every future event of `kind`.
    ///
    /// Must be called from within a tokio runtime. On a disconnected channel
    /// the returned token is inert.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);

        let open = self.open.lock().expect("event channel mutex poisoned");
        if !*open {
            tracing::debug!("subscribe({kind}) on a closed channel");
            return Subscription {
                id,
                kind,
                registry: Weak::new(),
            };
        }

        let (queue, mut rx) = mpsc::unbounded_channel::<ChannelEvent>();
        let backlog = Arc::new(AtomicUsize::new(0));
        let gate: HandlerGate = Arc::new(Mutex::new(true));
        let task_gate = gate.clone();
        let task_backlog = backlog.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                task_backlog.fetch_sub(1, Ordering::AcqRel);
                let open = task_gate.lock().expect("handler gate mutex poisoned");
                if !*open {
                    break;
                }
                handler(&event);
            }
        });

        self.subscriptions.insert(
            id,
            SubscriptionEntry {
                kind,
                gate,
                queue,
                backlog,
                task,
            },
        );
        drop(open);
        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.subscriptions),
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value().kind == kind)
            .count()
    }

    /// Close the connection and cancel every subscription. Returns how many
    /// subscriptions were flushed.
    pub fn disconnect(&self) -> usize {
        let closed = {
            let mut open = self.open.lock().expect("event channel mutex poisoned");
            std::mem::replace(&mut *open, false)
        };

        let ids: Vec<u64> = self.subscriptions.iter().map(|entry| *entry.key()).collect();
        let mut flushed = 0;
        for id in ids {
            if let Some((_, entry)) = self.subscriptions.remove(&id) {
                entry.cancel();
                flushed += 1;
            }
        }

        if closed {
            tracing::info!(
                connection_id = %self.connection_id,
                "event channel disconnected, flushed {flushed} subscriptions"
            );
        }
        flushed
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Handle returned by [`EventChannel::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains_key(&self.id))
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Some((_, entry)) = registry.remove(&self.id) {
                entry.cancel();
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}
