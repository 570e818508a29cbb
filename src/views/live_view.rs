//! Generic mounted view: one snapshot fed by a REST load and live deltas.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::ApiError;
use crate::bus::{ChannelEvent, DomainEvent, EventChannel, EventKind, MalformedEvent, Subscription};
use crate::core::{ConfirmationState, Delta, MergeOutcome, ReadFlag, Snapshot, SnapshotRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    /// Some sources of an aggregated load failed; the snapshot holds the rest.
    Partial(String),
    Failed(String),
}

impl LoadState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Partial(error) | Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("failed to load {feature}: {source}")]
    Fetch {
        feature: &'static str,
        #[source]
        source: ApiError,
    },
    #[error("{action} failed: {source}")]
    Mutation {
        action: String,
        #[source]
        source: ApiError,
    },
    #[error("{feature} view is unmounted")]
    Unmounted { feature: &'static str },
    #[error("{feature} load was superseded by a newer load")]
    Superseded { feature: &'static str },
    #[error("{feature} record not found: {key}")]
    NotFound { feature: &'static str, key: String },
    #[error("interview {id} is already {state}")]
    InvalidTransition { id: String, state: ConfirmationState },
}

/// Turns a validated event into a snapshot delta.
pub type Decoder<R> = dyn Fn(&DomainEvent) -> Result<Delta<R>, MalformedEvent> + Send + Sync;

/// Decoder for creation kinds: the payload is the whole record.
pub fn insert_decoder<R>() -> impl Fn(&DomainEvent) -> Result<Delta<R>, MalformedEvent> + Send + Sync
where
    R: SnapshotRecord + DeserializeOwned,
{
    |event: &DomainEvent| event.decode::<R>().map(Delta::Insert)
}

/// Decoder for update kinds: the payload is a patch for the record named by
/// the event id.
pub fn patch_decoder<R>() -> impl Fn(&DomainEvent) -> Result<Delta<R>, MalformedEvent> + Send + Sync
where
    R: SnapshotRecord,
    R::Patch: DeserializeOwned,
{
    |event: &DomainEvent| {
        event.decode::<R::Patch>().map(|patch| Delta::Update {
            key: event.id.clone(),
            patch,
        })
    }
}

struct ViewState<R> {
    snapshot: Snapshot<R>,
    load: LoadState,
    generation: u64,
    /// Records inserted while a load is in flight. Replayed over the fetched
    /// list, which may predate them.
    inserted_during_load: Option<Vec<R>>,
}

impl<R: SnapshotRecord> ViewState<R> {
    fn merge(&mut self, delta: Delta<R>) -> MergeOutcome {
        let replay = match (&delta, self.inserted_during_load.is_some()) {
            (Delta::Insert(record), true) => Some(record.clone()),
            _ => None,
        };
        let outcome = self.snapshot.apply(delta);
        if let (Some(record), MergeOutcome::Inserted) = (replay, outcome) {
            if let Some(pending) = self.inserted_during_load.as_mut() {
                pending.push(record);
            }
        }
        outcome
    }
}

pub struct LiveView<R: SnapshotRecord> {
    feature: &'static str,
    state: Arc<Mutex<ViewState<R>>>,
    mounted: Arc<AtomicBool>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl<R: SnapshotRecord> LiveView<R> {
    /// A mounted view with an empty snapshot.
    pub fn new(feature: &'static str) -> Self {
        Self {
            feature,
            state: Arc::new(Mutex::new(ViewState {
                snapshot: Snapshot::new(),
                load: LoadState::Idle,
                generation: 0,
                inserted_during_load: None,
            })),
            mounted: Arc::new(AtomicBool::new(true)),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn feature(&self) -> &'static str {
        self.feature
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewState<R>> {
        self.state.lock().expect("view state mutex poisoned")
    }

    fn ensure_mounted(&self) -> Result<(), ViewError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(ViewError::Unmounted {
                feature: self.feature,
            })
        }
    }

    /// Replace the snapshot with the result of `fetch`.
    ///
    /// A response that lands after unmount, or after a newer load started, is
    /// discarded. Records inserted by creation events while the fetch was in
    /// flight are merged back over the fetched list. A failed fetch leaves the
    /// snapshot untouched and records the error in the load state.
    pub async fn load<Fut>(&self, fetch: Fut) -> Result<usize, ViewError>
    where
        Fut: Future<Output = Result<Vec<R>, ApiError>>,
    {
        self.ensure_mounted()?;
        let generation = {
            let mut state = self.lock();
            state.generation += 1;
            state.load = LoadState::Loading;
            state.inserted_during_load.get_or_insert_with(Vec::new);
            state.generation
        };

        let result = fetch.await;

        let mut state = self.lock();
        if !self.is_mounted() {
            tracing::debug!("{}: discarding fetch that finished after unmount", self.feature);
            return Err(ViewError::Unmounted {
                feature: self.feature,
            });
        }
        if state.generation != generation {
            tracing::debug!("{}: discarding superseded fetch", self.feature);
            return Err(ViewError::Superseded {
                feature: self.feature,
            });
        }

        let live = state.inserted_during_load.take().unwrap_or_default();
        match result {
            Ok(records) => {
                state.snapshot.replace(records);
                let mut replayed = 0;
                for record in live {
                    if state.snapshot.insert(record) == MergeOutcome::Inserted {
                        replayed += 1;
                    }
                }
                let count = state.snapshot.len();
                state.load = LoadState::Loaded;
                tracing::debug!(
                    "{}: loaded {count} records ({replayed} kept from live events)",
                    self.feature
                );
                Ok(count)
            }
            Err(source) => {
                tracing::warn!("{}: fetch failed: {source}", self.feature);
                state.load = LoadState::Failed(source.to_string());
                Err(ViewError::Fetch {
                    feature: self.feature,
                    source,
                })
            }
        }
    }

    /// Merge every future `kind` event from `channel` into the snapshot.
    pub fn listen<F>(&self, channel: &EventChannel, kind: EventKind, decoder: F)
    where
        F: Fn(&DomainEvent) -> Result<Delta<R>, MalformedEvent> + Send + Sync + 'static,
    {
        if !self.is_mounted() {
            return;
        }
        let state = self.state.clone();
        let mounted = self.mounted.clone();
        let feature = self.feature;
        let subscription = channel.subscribe(kind, move |event| {
            if mounted.load(Ordering::Acquire) {
                merge_event(&state, feature, event, &decoder);
            }
        });
        self.subscriptions
            .lock()
            .expect("view subscriptions mutex poisoned")
            .push(subscription);
    }

    /// Merge one channel event synchronously.
    pub fn apply_event(&self, event: &ChannelEvent, decoder: &Decoder<R>) -> MergeOutcome {
        if !self.is_mounted() {
            return MergeOutcome::Dropped;
        }
        merge_event(&self.state, self.feature, event, decoder)
    }

    /// Apply a locally produced delta (e.g. the record a mutation returned).
    pub fn apply(&self, delta: Delta<R>) -> MergeOutcome {
        if !self.is_mounted() {
            return MergeOutcome::Dropped;
        }
        self.lock().merge(delta)
    }

    /// Put `record` in place of the record under `key`, e.g. a server copy
    /// replacing a provisional one.
    pub fn swap(&self, key: &str, record: R) -> MergeOutcome {
        if !self.is_mounted() {
            return MergeOutcome::Dropped;
        }
        let mut state = self.lock();
        state.snapshot.remove(key);
        if let Some(pending) = state.inserted_during_load.as_mut() {
            pending.retain(|live| live.key() != key);
        }
        state.merge(Delta::Insert(record))
    }

    pub fn modify<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut R),
    {
        self.is_mounted() && self.lock().snapshot.modify(key, f)
    }

    pub fn modify_where<P, F>(&self, predicate: P, f: F) -> Vec<String>
    where
        P: Fn(&R) -> bool,
        F: FnMut(&mut R),
    {
        if !self.is_mounted() {
            return Vec::new();
        }
        self.lock().snapshot.modify_where(predicate, f)
    }

    /// Optimistic mutation: apply `local` to the record now, then await
    /// `remote`. A remote failure is logged and returned but the local change
    /// is kept.
    pub async fn optimistic<L, Fut>(
        &self,
        key: &str,
        action: impl Into<String>,
        local: L,
        remote: Fut,
    ) -> Result<(), ViewError>
    where
        L: FnOnce(&mut R),
        Fut: Future<Output = Result<(), ApiError>>,
    {
        self.ensure_mounted()?;
        if !self.modify(key, local) {
            return Err(ViewError::NotFound {
                feature: self.feature,
                key: key.to_string(),
            });
        }
        let action = action.into();
        remote.await.map_err(|source| {
            tracing::warn!("{}: {action} failed, keeping local state: {source}", self.feature);
            ViewError::Mutation { action, source }
        })
    }

    pub fn records(&self) -> Vec<R> {
        self.lock().snapshot.to_vec()
    }

    pub fn get(&self, key: &str) -> Option<R> {
        self.lock().snapshot.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().snapshot.is_empty()
    }

    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&R) -> bool,
    {
        self.lock().snapshot.count(predicate)
    }

    pub fn filtered<P>(&self, predicate: P) -> Vec<R>
    where
        P: Fn(&R) -> bool,
    {
        self.lock()
            .snapshot
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    pub fn is_sorted(&self) -> bool {
        self.lock().snapshot.is_sorted()
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load.clone()
    }

    /// Flag a successful load as incomplete.
    pub(crate) fn mark_partial(&self, error: String) {
        let mut state = self.lock();
        if state.load == LoadState::Loaded {
            state.load = LoadState::Partial(error);
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .expect("view subscriptions mutex poisoned")
            .len()
    }

    /// Stop live updates and ignore any in-flight load.
    pub fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        let subscriptions: Vec<Subscription> = self
            .subscriptions
            .lock()
            .expect("view subscriptions mutex poisoned")
            .drain(..)
            .collect();
        tracing::debug!(
            "{}: unmounted, released {} subscriptions",
            self.feature,
            subscriptions.len()
        );
        drop(subscriptions);
    }
}

impl<R: SnapshotRecord + ReadFlag> LiveView<R> {
    /// Derived from the snapshot on every call.
    pub fn unread_count(&self) -> usize {
        self.count(|record| !record.is_read())
    }

    /// Mark one record read, optimistically. `remote` only runs when the
    /// record was unread. Returns whether the record changed.
    pub async fn mark_read<F, Fut>(&self, key: &str, remote: F) -> Result<bool, ViewError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        self.ensure_mounted()?;
        match self.get(key) {
            None => Err(ViewError::NotFound {
                feature: self.feature,
                key: key.to_string(),
            }),
            Some(record) if record.is_read() => Ok(false),
            Some(_) => self
                .optimistic(key, format!("mark {key} read"), R::set_read, remote())
                .await
                .map(|()| true),
        }
    }

    /// Mark every unread record read locally, then run `remote` for each of
    /// them concurrently. Failures are logged and the first one is returned;
    /// nothing is rolled back.
    pub async fn mark_all_read<F, Fut>(&self, remote: F) -> Result<usize, ViewError>
    where
        F: Fn(R) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        self.ensure_mounted()?;
        let marked: Vec<R> = {
            let mut state = self.lock();
            let keys = state
                .snapshot
                .modify_where(|record| !record.is_read(), R::set_read);
            let marked: Vec<R> = keys
                .iter()
                .filter_map(|key| state.snapshot.get(key).cloned())
                .collect();
            marked
        };
        let count = marked.len();

        let results = futures::future::join_all(marked.into_iter().map(remote)).await;
        let mut first_error = None;
        for error in results.into_iter().filter_map(Result::err) {
            tracing::warn!("{}: mark all read failed for one record: {error}", self.feature);
            first_error.get_or_insert(error);
        }
        match first_error {
            Some(source) => Err(ViewError::Mutation {
                action: "mark all read".to_string(),
                source,
            }),
            None => Ok(count),
        }
    }
}

impl<R: SnapshotRecord> Drop for LiveView<R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn merge_event<R, F>(
    state: &Mutex<ViewState<R>>,
    feature: &'static str,
    event: &ChannelEvent,
    decoder: &F,
) -> MergeOutcome
where
    R: SnapshotRecord,
    F: Fn(&DomainEvent) -> Result<Delta<R>, MalformedEvent> + ?Sized,
{
    let delta = match DomainEvent::from_channel(event).and_then(|domain| decoder(&domain)) {
        Ok(delta) => delta,
        Err(error) => {
            tracing::warn!("{feature}: dropping malformed event (seq {}): {error}", event.seq);
            return MergeOutcome::Rejected;
        }
    };

    let outcome = state
        .lock()
        .expect("view state mutex poisoned")
        .merge(delta);
    tracing::debug!("{feature}: {} seq {} -> {outcome:?}", event.kind, event.seq);
    outcome
}
