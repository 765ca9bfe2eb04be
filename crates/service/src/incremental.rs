//! Incremental, subscribable loader for one insight entity type.
//!
//! A *cycle* starts with [`IncrementalDataService::load_initial_data`]: the
//! first page is fetched inline, later pages are fetched by a background
//! continuation task every `delay` until the backend returns an empty page.
//! Each cycle carries a generation number; results from a superseded cycle
//! are discarded before they touch the state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use adoption_insights_core::{
    BatchLoadConfig, EntityType, FetchError, Filters, Insight, InsightFetcher, Page, PageRange,
    ServiceState,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::ServiceError;
use crate::subscribers::{Subscribers, Subscription};

/// Loader handle owned by one view.
///
/// Dropping the handle tears the loader down exactly like
/// [`destroy`](Self::destroy).
pub struct IncrementalDataService<T: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Clone + Send + Sync + 'static> {
    entity: EntityType,
    config: BatchLoadConfig,
    fetcher: Arc<dyn InsightFetcher<T>>,
    shared: Mutex<Shared<T>>,
    subscribers: Arc<Subscribers<T>>,
    watch_tx: watch::Sender<ServiceState<T>>,
}

struct Shared<T> {
    state: ServiceState<T>,
    filters: Filters,
    generation: u64,
    /// Sequence number of the last published snapshot.
    published: u64,
    paused: bool,
    fetching: bool,
    destroyed: bool,
    continuation: Option<JoinHandle<()>>,
    auto_refresh: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> IncrementalDataService<T> {
    /// Creates a loader with batch continuation paused.
    pub fn new<F>(entity: EntityType, fetcher: F, config: BatchLoadConfig) -> Self
    where
        F: InsightFetcher<T> + 'static,
    {
        let (watch_tx, _) = watch::channel(ServiceState::default());
        let inner = Inner {
            entity,
            config,
            fetcher: Arc::new(fetcher),
            shared: Mutex::new(Shared {
                state: ServiceState::default(),
                filters: Filters::new(),
                generation: 0,
                published: 0,
                paused: true,
                fetching: false,
                destroyed: false,
                continuation: None,
                auto_refresh: None,
            }),
            subscribers: Arc::new(Subscribers::new()),
            watch_tx,
        };
        tracing::debug!(
            %entity,
            batch_size = config.batch_size(),
            delay = ?config.delay(),
            "incremental data service created"
        );
        Self { inner: Arc::new(inner) }
    }

    /// Creates a loader from an entity name, failing before any network call
    /// when the name is unknown.
    pub fn from_entity_name<F>(
        entity: &str,
        fetcher: F,
        config: BatchLoadConfig,
    ) -> Result<Self, ServiceError>
    where
        F: InsightFetcher<T> + 'static,
    {
        let entity: EntityType = entity.parse()?;
        Ok(Self::new(entity, fetcher, config))
    }

    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.inner.entity
    }

    #[must_use]
    pub fn config(&self) -> BatchLoadConfig {
        self.inner.config
    }

    /// Active filter set of the current cycle.
    #[must_use]
    pub fn filters(&self) -> Filters {
        self.inner.lock().filters.clone()
    }

    /// Identifier of the current cycle; 0 before the first load.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn get_state(&self) -> ServiceState<T> {
        self.inner.lock().state.clone()
    }

    /// Registers `listener`; it immediately receives the current state and
    /// then every published change.
    pub fn subscribe<L>(&self, listener: L) -> Subscription<T>
    where
        L: Fn(ServiceState<T>) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let id = self.inner.subscribers.add(listener.clone());
        let (seq, snapshot, destroyed) = {
            let shared = self.inner.lock();
            (shared.published, shared.state.clone(), shared.destroyed)
        };
        if destroyed {
            tracing::debug!(entity = %self.inner.entity, "subscribe after destroy, listener ignored");
            self.inner.subscribers.remove(id);
            listener(snapshot);
        } else {
            self.inner.subscribers.notify_one(id, seq, &snapshot);
        }
        Subscription::new(id, Arc::downgrade(&self.inner.subscribers))
    }

    /// Async view of the same publications, for consumers that prefer
    /// awaiting changes over callbacks.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ServiceState<T>> {
        self.inner.watch_tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Starts a new cycle with `filters`, superseding any running one.
    ///
    /// Resolves once the first page has settled (or the cycle was superseded
    /// while it was in flight). Fetch failures land in `state.error`.
    pub async fn load_initial_data(&self, filters: Filters) {
        self.inner.load_initial_data(filters).await;
    }

    /// Restarts the current cycle with the stored filters.
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub fn pause_batch_loading(&self) {
        let mut shared = self.inner.lock();
        if !shared.paused {
            tracing::debug!(entity = %self.inner.entity, generation = shared.generation, "batch loading paused");
        }
        shared.paused = true;
    }

    /// Clears the pause flag and, when the cycle still has pages to load but
    /// nothing is scheduled, schedules the next continuation.
    pub fn resume_batch_loading(&self) {
        let mut shared = self.inner.lock();
        shared.paused = false;
        if shared.destroyed {
            return;
        }
        let scheduled = shared.continuation.as_ref().is_some_and(|h| !h.is_finished());
        let resumable = shared.generation > 0
            && shared.state.has_more
            && !shared.state.loading
            && shared.state.error.is_none();
        tracing::debug!(
            entity = %self.inner.entity,
            generation = shared.generation,
            scheduled,
            resumable,
            "batch loading resumed"
        );
        if resumable && !scheduled {
            let generation = shared.generation;
            self.inner.schedule_continuation(&mut shared, generation);
        }
    }

    #[must_use]
    pub fn is_batch_loading_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Starts the periodic full reload, replacing a running timer.
    ///
    /// A zero interval is rejected with a warning and leaves no timer.
    pub fn start_auto_refresh(&self) {
        let period = self.inner.config.auto_refresh_interval();
        let mut shared = self.inner.lock();
        if shared.destroyed {
            return;
        }
        if let Some(handle) = shared.auto_refresh.take() {
            handle.abort();
        }
        if period.is_zero() {
            tracing::warn!(entity = %self.inner.entity, "auto-refresh interval is zero, not starting");
            return;
        }
        let inner = Arc::clone(&self.inner);
        shared.auto_refresh = spawn_task(run_auto_refresh(inner, period));
        tracing::info!(
            entity = %self.inner.entity,
            interval = ?period,
            "auto-refresh started"
        );
    }

    pub fn stop_auto_refresh(&self) {
        if let Some(handle) = self.inner.lock().auto_refresh.take() {
            handle.abort();
            tracing::info!(entity = %self.inner.entity, "auto-refresh stopped");
        }
    }

    #[must_use]
    pub fn is_auto_refreshing(&self) -> bool {
        self.inner.lock().auto_refresh.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels both timers, drops every subscriber, and discards any fetch
    /// still in flight. Safe to call more than once.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }
}

impl<T: Insight> IncrementalDataService<T> {
    /// Creates a loader bound to the entity type of the record type `T`.
    pub fn for_insight<F>(fetcher: F, config: BatchLoadConfig) -> Self
    where
        F: InsightFetcher<T> + 'static,
    {
        Self::new(T::ENTITY, fetcher, config)
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for IncrementalDataService<T> {
    fn drop(&mut self) {
        self.inner.destroy();
    }
}

impl<T: Clone + Send + Sync + 'static> std::fmt::Debug for IncrementalDataService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("IncrementalDataService")
            .field("entity", &self.inner.entity)
            .field("config", &self.inner.config)
            .field("generation", &shared.generation)
            .field("records", &shared.state.data.len())
            .field("has_more", &shared.state.has_more)
            .field("paused", &shared.paused)
            .field("destroyed", &shared.destroyed)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the state held by `shared`, releasing the lock before
    /// listeners run.
    fn publish(&self, mut shared: MutexGuard<'_, Shared<T>>) {
        shared.published = shared.published.wrapping_add(1);
        let seq = shared.published;
        let snapshot = shared.state.clone();
        self.watch_tx.send_replace(snapshot.clone());
        drop(shared);
        self.subscribers.notify(seq, &snapshot);
    }

    async fn load_initial_data(self: &Arc<Self>, filters: Filters) {
        let batch_size = self.config.batch_size();
        let generation = {
            let mut shared = self.lock();
            if shared.destroyed {
                tracing::warn!(entity = %self.entity, "load requested after destroy, ignoring");
                return;
            }
            if let Some(handle) = shared.continuation.take() {
                handle.abort();
            }
            shared.generation = shared.generation.wrapping_add(1);
            shared.filters = filters.clone();
            shared.state = ServiceState::loading();
            shared.fetching = true;
            let generation = shared.generation;
            self.publish(shared);
            generation
        };

        tracing::info!(entity = %self.entity, generation, filters = filters.len(), "loading cycle started");
        let range = PageRange::for_page(0, batch_size);
        let inner = Arc::clone(self);
        let first_page = async move {
            let result = inner.fetcher.fetch(inner.entity, &filters, range).await;
            inner.apply_first_page(generation, result);
        };

        // The first page runs as its own task so that dropping this future or
        // aborting the auto-refresh timer cannot leave the cycle loading.
        match Handle::try_current() {
            Ok(handle) => {
                if let Err(e) = handle.spawn(first_page).await {
                    tracing::error!(entity = %self.entity, generation, error = %e, "first page task failed");
                    self.apply_first_page(
                        generation,
                        Err(FetchError::new(format!("first page task failed: {e}"))),
                    );
                }
            },
            Err(_) => first_page.await,
        }
    }

    async fn refresh(self: &Arc<Self>) {
        let filters = self.lock().filters.clone();
        self.load_initial_data(filters).await;
    }

    fn apply_first_page(self: &Arc<Self>, generation: u64, result: Result<Page<T>, FetchError>) {
        let mut shared = self.lock();
        if shared.destroyed || shared.generation != generation {
            tracing::debug!(entity = %self.entity, generation, "discarding first page of superseded cycle");
            return;
        }
        shared.fetching = false;
        match result {
            Ok(page) => {
                let has_more = !page.records.is_empty();
                let total_count =
                    page.total_count.filter(|&n| n > 0).unwrap_or(page.records.len());
                tracing::info!(
                    entity = %self.entity,
                    generation,
                    records = page.records.len(),
                    total_count,
                    "first page loaded"
                );
                shared.state = ServiceState {
                    data: page.records,
                    loading: false,
                    error: None,
                    has_more,
                    current_page: 1,
                    total_count,
                };
                if has_more {
                    self.schedule_continuation(&mut shared, generation);
                }
            },
            Err(err) => {
                log_fetch_failure(self.entity, generation, 0, &err);
                shared.state.loading = false;
                shared.state.error = Some(err.to_string());
            },
        }
        self.publish(shared);
    }

    /// Applies a continuation page. Returns whether the cycle should keep
    /// going.
    fn apply_next_page(&self, generation: u64, result: Result<Page<T>, FetchError>) -> bool {
        let mut shared = self.lock();
        if shared.destroyed || shared.generation != generation {
            tracing::debug!(entity = %self.entity, generation, "discarding page of superseded cycle");
            return false;
        }
        shared.fetching = false;
        let page_index = shared.state.current_page;
        let keep_going = match result {
            Ok(page) => {
                let received = page.records.len();
                let state = &mut shared.state;
                state.data.extend(page.records);
                state.current_page = state.current_page.saturating_add(1);
                state.total_count = state.data.len();
                state.has_more = received > 0;
                if state.has_more {
                    tracing::debug!(
                        entity = %self.entity,
                        generation,
                        page = page_index,
                        records = received,
                        accumulated = state.total_count,
                        "page appended"
                    );
                } else {
                    tracing::info!(
                        entity = %self.entity,
                        generation,
                        total_count = state.total_count,
                        "loading cycle complete"
                    );
                }
                state.has_more
            },
            Err(err) => {
                log_fetch_failure(self.entity, generation, page_index, &err);
                shared.state.error = Some(err.to_string());
                false
            },
        };
        self.publish(shared);
        keep_going
    }

    fn schedule_continuation(self: &Arc<Self>, shared: &mut Shared<T>, generation: u64) {
        if let Some(handle) = shared.continuation.take() {
            handle.abort();
        }
        shared.continuation = spawn_task(run_continuation(Arc::clone(self), generation));
    }

    fn destroy(&self) {
        let mut shared = self.lock();
        if shared.destroyed {
            return;
        }
        shared.destroyed = true;
        if let Some(handle) = shared.continuation.take() {
            handle.abort();
        }
        if let Some(handle) = shared.auto_refresh.take() {
            handle.abort();
        }
        let generation = shared.generation;
        drop(shared);
        self.subscribers.clear();
        tracing::debug!(entity = %self.entity, generation, "incremental data service destroyed");
    }
}

/// Background continuation of one cycle: waits `delay`, then fetches and
/// appends the next page until the cycle is exhausted, fails, or is
/// superseded. While paused it keeps re-checking every `delay`.
async fn run_continuation<T: Clone + Send + Sync + 'static>(inner: Arc<Inner<T>>, generation: u64) {
    let delay = inner.config.delay();
    let batch_size = inner.config.batch_size();
    loop {
        tokio::time::sleep(delay).await;

        let (filters, range) = {
            let mut shared = inner.lock();
            if shared.destroyed || shared.generation != generation || !shared.state.has_more {
                return;
            }
            if shared.paused || shared.fetching {
                continue;
            }
            shared.fetching = true;
            (shared.filters.clone(), PageRange::for_page(shared.state.current_page, batch_size))
        };

        tracing::debug!(entity = %inner.entity, generation, start = range.start, end = range.end, "fetching next page");
        let result = inner.fetcher.fetch(inner.entity, &filters, range).await;
        if !inner.apply_next_page(generation, result) {
            return;
        }
    }
}

async fn run_auto_refresh<T: Clone + Send + Sync + 'static>(inner: Arc<Inner<T>>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        tracing::debug!(entity = %inner.entity, "auto-refresh tick");
        inner.refresh().await;
    }
}

fn spawn_task<F>(future: F) -> Option<JoinHandle<()>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(e) => {
            tracing::error!(error = %e, "no Tokio runtime available, timer not started");
            None
        },
    }
}

fn log_fetch_failure(entity: EntityType, generation: u64, page: usize, err: &FetchError) {
    tracing::warn!(
        %entity,
        generation,
        page,
        auth_failure = err.is_auth_failure(),
        error = %err,
        "insight fetch failed"
    );
}
