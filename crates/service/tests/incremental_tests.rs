use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adoption_insights_core::{
    BatchLoadConfig, EntityType, FetchError, Filters, InsightFetcher, Page, PageRange,
};
use adoption_insights_service::{IncrementalDataService, ServiceState};
use async_trait::async_trait;
use tokio::sync::Notify;

type Script = dyn Fn(&Filters, usize) -> Result<Page<u32>, FetchError> + Send + Sync;

/// Fetcher whose pages come from a script keyed by (filters, page index).
struct StubFetcher {
    batch_size: usize,
    script: Box<Script>,
    calls: Mutex<Vec<(Filters, PageRange)>>,
    /// Fetches whose `tenant` filter matches block until notified.
    gate: Option<(String, Arc<Notify>)>,
}

impl StubFetcher {
    fn new<S>(batch_size: usize, script: S) -> Arc<Self>
    where
        S: Fn(&Filters, usize) -> Result<Page<u32>, FetchError> + Send + Sync + 'static,
    {
        Arc::new(Self { batch_size, script: Box::new(script), calls: Mutex::new(Vec::new()), gate: None })
    }

    fn gated<S>(batch_size: usize, tenant: &str, notify: Arc<Notify>, script: S) -> Arc<Self>
    where
        S: Fn(&Filters, usize) -> Result<Page<u32>, FetchError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            batch_size,
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            gate: Some((tenant.to_owned(), notify)),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<(Filters, PageRange)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightFetcher<u32> for StubFetcher {
    async fn fetch(
        &self,
        _entity: EntityType,
        filters: &Filters,
        range: PageRange,
    ) -> Result<Page<u32>, FetchError> {
        self.calls.lock().unwrap().push((filters.clone(), range));
        if let Some((tenant, notify)) = &self.gate {
            if filters.get("tenant") == Some(tenant.as_str()) {
                notify.notified().await;
            }
        }
        (self.script)(filters, range.start / self.batch_size)
    }
}

/// Pages `[1,2]`, `[3,4]`, `[]` with a reported total of 5.
fn example_pages(_filters: &Filters, page: usize) -> Result<Page<u32>, FetchError> {
    match page {
        0 => Ok(Page::new(vec![1, 2], Some(5))),
        1 => Ok(Page::new(vec![3, 4], None)),
        _ => Ok(Page::empty()),
    }
}

fn config(batch_size: usize, delay_ms: u64, refresh_ms: u64) -> BatchLoadConfig {
    BatchLoadConfig::new(batch_size, Duration::from_millis(delay_ms), Duration::from_millis(refresh_ms))
        .unwrap()
}

fn service(fetcher: &Arc<StubFetcher>, config: BatchLoadConfig) -> IncrementalDataService<u32> {
    IncrementalDataService::new(EntityType::Organization, Arc::clone(fetcher), config)
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

fn record_states(svc: &IncrementalDataService<u32>) -> Arc<Mutex<Vec<ServiceState<u32>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    svc.subscribe(move |state| sink.lock().unwrap().push(state)).detach();
    seen
}

#[tokio::test(start_paused = true)]
async fn test_example_scenario() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));

    svc.load_initial_data(Filters::new()).await;
    let state = svc.get_state();
    assert_eq!(state.data, vec![1, 2]);
    assert!(!state.loading);
    assert!(state.has_more);
    assert_eq!(state.current_page, 1);
    assert_eq!(state.total_count, 5);

    svc.resume_batch_loading();
    advance(100).await;
    let state = svc.get_state();
    assert_eq!(state.data, vec![1, 2, 3, 4]);
    assert!(state.has_more);
    assert_eq!(state.current_page, 2);
    assert_eq!(state.total_count, 4);

    advance(100).await;
    let state = svc.get_state();
    assert_eq!(state.data, vec![1, 2, 3, 4]);
    assert!(!state.has_more);
    assert_eq!(fetcher.call_count(), 3);

    advance(1000).await;
    assert_eq!(fetcher.call_count(), 3);

    let ranges: Vec<PageRange> = fetcher.calls().into_iter().map(|(_, r)| r).collect();
    assert_eq!(ranges, vec![PageRange::new(0, 2), PageRange::new(2, 4), PageRange::new(4, 6)]);
}

#[tokio::test(start_paused = true)]
async fn test_accumulation_is_concatenation_in_fetch_order() {
    let fetcher = StubFetcher::new(3, |_filters, page| {
        if page < 5 {
            let base = u32::try_from(page * 3).unwrap();
            Ok(Page::new(vec![base, base + 1, base + 2], Some(15)))
        } else {
            Ok(Page::empty())
        }
    });
    let svc = service(&fetcher, config(3, 50, 0));
    let seen = record_states(&svc);

    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;
    for _ in 0..6 {
        advance(50).await;
    }

    let state = svc.get_state();
    assert_eq!(state.data, (0..15).collect::<Vec<u32>>());
    assert!(!state.has_more);
    assert_eq!(state.current_page, 6);

    let seen = seen.lock().unwrap();
    let mut previous_len = 0;
    for snapshot in seen.iter().filter(|s| !s.loading && !s.data.is_empty()) {
        assert!(snapshot.data.len() >= previous_len);
        let expected: Vec<u32> = (0..u32::try_from(snapshot.data.len()).unwrap()).collect();
        assert_eq!(snapshot.data, expected);
        previous_len = snapshot.data.len();
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_stops_continuation() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;

    for _ in 0..10 {
        advance(100).await;
    }
    assert!(!svc.get_state().has_more);
    assert_eq!(fetcher.call_count(), 3);

    // Resuming an exhausted cycle schedules nothing.
    svc.pause_batch_loading();
    svc.resume_batch_loading();
    advance(500).await;
    assert_eq!(fetcher.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_new_filters_supersede_pending_continuation() {
    let fetcher = StubFetcher::new(2, |filters, page| {
        let base = if filters.get("tenant") == Some("b") { 100 } else { 0 };
        match page {
            0 | 1 => {
                let start = base + u32::try_from(page * 2).unwrap();
                Ok(Page::new(vec![start, start + 1], Some(4)))
            },
            _ => Ok(Page::empty()),
        }
    });
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();

    svc.load_initial_data(Filters::new().with("tenant", "a")).await;
    advance(50).await;
    svc.load_initial_data(Filters::new().with("tenant", "b")).await;
    assert_eq!(svc.get_state().data, vec![100, 101]);
    assert_eq!(svc.filters().get("tenant"), Some("b"));

    for _ in 0..5 {
        advance(100).await;
    }
    let state = svc.get_state();
    assert_eq!(state.data, vec![100, 101, 102, 103]);
    assert!(!state.has_more);

    let tenant_a_calls =
        fetcher.calls().into_iter().filter(|(f, _)| f.get("tenant") == Some("a")).count();
    assert_eq!(tenant_a_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_first_page_of_superseded_cycle_is_discarded() {
    let notify = Arc::new(Notify::new());
    let fetcher = StubFetcher::gated(2, "slow", Arc::clone(&notify), |filters, page| {
        let value = if filters.get("tenant") == Some("slow") { 900 } else { 1 };
        if page == 0 { Ok(Page::new(vec![value], Some(1))) } else { Ok(Page::empty()) }
    });
    let svc = Arc::new(service(&fetcher, config(2, 100, 0)));

    let slow_svc = Arc::clone(&svc);
    let slow = tokio::spawn(async move {
        slow_svc.load_initial_data(Filters::new().with("tenant", "slow")).await;
    });
    settle().await;
    assert!(svc.get_state().loading);

    svc.load_initial_data(Filters::new().with("tenant", "fast")).await;
    assert_eq!(svc.get_state().data, vec![1]);

    notify.notify_one();
    slow.await.unwrap();
    let state = svc.get_state();
    assert_eq!(state.data, vec![1]);
    assert!(!state.loading);
    assert_eq!(svc.filters().get("tenant"), Some("fast"));
}

#[tokio::test(start_paused = true)]
async fn test_paused_continuation_never_fetches_until_resumed() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));
    assert!(svc.is_batch_loading_paused());

    svc.load_initial_data(Filters::new()).await;
    for _ in 0..5 {
        advance(100).await;
    }
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(svc.get_state().data, vec![1, 2]);

    svc.resume_batch_loading();
    assert!(!svc.is_batch_loading_paused());
    advance(100).await;
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(svc.get_state().data, vec![1, 2, 3, 4]);

    svc.pause_batch_loading();
    advance(300).await;
    assert_eq!(fetcher.call_count(), 2);
    assert!(svc.get_state().has_more);
}

#[tokio::test(start_paused = true)]
async fn test_resume_before_first_load_does_not_fetch() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();
    advance(500).await;
    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(svc.get_state(), ServiceState::default());
}

#[tokio::test(start_paused = true)]
async fn test_first_page_failure_sets_error_and_stops() {
    let fetcher = StubFetcher::new(2, |_filters, _page| Err(FetchError::new("HTTP status 500: boom")));
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;

    let state = svc.get_state();
    assert!(!state.loading);
    assert!(state.data.is_empty());
    assert_eq!(state.error.as_deref(), Some("HTTP status 500: boom"));

    advance(1000).await;
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mid_cycle_failure_keeps_accumulated_data() {
    let fetcher = StubFetcher::new(2, |_filters, page| match page {
        0 => Ok(Page::new(vec![1, 2], Some(6))),
        1 => Ok(Page::new(vec![3, 4], None)),
        _ => Err(FetchError::new("connection reset")),
    });
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;
    advance(100).await;
    advance(100).await;

    let state = svc.get_state();
    assert_eq!(state.data, vec![1, 2, 3, 4]);
    assert_eq!(state.error.as_deref(), Some("connection reset"));
    assert!(state.is_partial());
    assert_eq!(fetcher.call_count(), 3);

    advance(1000).await;
    assert_eq!(fetcher.call_count(), 3);

    // A failed cycle is not resumed; a new cycle clears the error.
    svc.resume_batch_loading();
    advance(200).await;
    assert_eq!(fetcher.call_count(), 3);
    svc.refresh().await;
    assert_eq!(svc.get_state().error, None);
    assert_eq!(svc.get_state().data, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_surfaced_as_error() {
    let fetcher = StubFetcher::new(2, |_filters, _page| {
        Err(FetchError::new("HTTP status 401: Authentication required (Token has expired)"))
    });
    let svc = service(&fetcher, config(2, 100, 0));
    svc.load_initial_data(Filters::new()).await;

    let error = svc.get_state().error.unwrap();
    assert!(FetchError::new(error).is_auth_failure());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_is_idempotent_and_stops_all_timers() {
    let fetcher = StubFetcher::new(2, |_filters, page| Ok(Page::new(vec![u32::try_from(page).unwrap()], None)));
    let svc = service(&fetcher, config(2, 100, 1000));
    let seen = record_states(&svc);
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;
    svc.start_auto_refresh();
    assert!(svc.is_auto_refreshing());
    assert_eq!(svc.subscriber_count(), 1);

    svc.destroy();
    svc.destroy();
    assert!(svc.is_destroyed());
    assert!(!svc.is_auto_refreshing());
    assert_eq!(svc.subscriber_count(), 0);

    let calls = fetcher.call_count();
    let published = seen.lock().unwrap().len();
    for _ in 0..10 {
        advance(500).await;
    }
    assert_eq!(fetcher.call_count(), calls);
    assert_eq!(seen.lock().unwrap().len(), published);

    svc.load_initial_data(Filters::new()).await;
    svc.refresh().await;
    svc.resume_batch_loading();
    svc.start_auto_refresh();
    advance(2000).await;
    assert_eq!(fetcher.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_discards_in_flight_result() {
    let notify = Arc::new(Notify::new());
    let fetcher = StubFetcher::gated(2, "slow", Arc::clone(&notify), |_filters, _page| {
        Ok(Page::new(vec![7], Some(1)))
    });
    let svc = Arc::new(service(&fetcher, config(2, 100, 0)));

    let loader = Arc::clone(&svc);
    let task = tokio::spawn(async move {
        loader.load_initial_data(Filters::new().with("tenant", "slow")).await;
    });
    settle().await;
    svc.destroy();
    notify.notify_one();
    task.await.unwrap();

    let state = svc.get_state();
    assert!(state.data.is_empty());
    assert!(state.loading);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_service_stops_timers() {
    let fetcher = StubFetcher::new(2, |_filters, page| Ok(Page::new(vec![u32::try_from(page).unwrap()], None)));
    let svc = service(&fetcher, config(2, 100, 1000));
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;
    svc.start_auto_refresh();
    let calls = fetcher.call_count();

    drop(svc);
    for _ in 0..5 {
        advance(1000).await;
    }
    assert_eq!(fetcher.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_fires_once_per_interval() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 1000));
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    svc.load_initial_data(Filters::new().with("region", "eu")).await;
    svc.subscribe(move |state| {
        if state.loading {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    })
    .detach();

    svc.start_auto_refresh();
    advance(999).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    advance(1).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(svc.get_state().data, vec![1, 2]);

    advance(1000).await;
    advance(1000).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 3);

    // Every refresh reused the stored filters.
    assert!(fetcher.calls().iter().all(|(f, _)| f.get("region") == Some("eu")));

    svc.stop_auto_refresh();
    assert!(!svc.is_auto_refreshing());
    advance(5000).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_restarting_auto_refresh_replaces_timer() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 1000));
    svc.load_initial_data(Filters::new()).await;

    svc.start_auto_refresh();
    advance(500).await;
    svc.start_auto_refresh();
    advance(500).await;
    assert_eq!(fetcher.call_count(), 1);
    advance(500).await;
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_auto_refresh_interval_starts_nothing() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));
    svc.start_auto_refresh();
    assert!(!svc.is_auto_refreshing());
}

#[tokio::test]
async fn test_unknown_entity_name_fails_before_any_fetch() {
    let fetcher = StubFetcher::new(2, example_pages);
    let result =
        IncrementalDataService::<u32>::from_entity_name("teams", Arc::clone(&fetcher), config(2, 100, 0));
    let err = result.unwrap_err();
    assert!(err.is_unknown_entity());
    assert_eq!(fetcher.call_count(), 0);

    let svc =
        IncrementalDataService::<u32>::from_entity_name("projects", Arc::clone(&fetcher), config(2, 100, 0))
            .unwrap();
    assert_eq!(svc.entity_type(), EntityType::Project);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_receive_copies_and_can_unsubscribe() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));

    let first = Arc::new(Mutex::new(Vec::<ServiceState<u32>>::new()));
    let second = Arc::new(Mutex::new(Vec::<ServiceState<u32>>::new()));
    let first_sink = Arc::clone(&first);
    let second_sink = Arc::clone(&second);
    let sub_first = svc.subscribe(move |state| first_sink.lock().unwrap().push(state));
    let _sub_second = svc.subscribe(move |mut state| {
        state.data.push(999);
        second_sink.lock().unwrap().push(state);
    });

    // Current state is delivered on subscribe.
    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(first.lock().unwrap()[0], ServiceState::default());

    svc.load_initial_data(Filters::new()).await;
    assert_eq!(svc.get_state().data, vec![1, 2]);
    {
        let first = first.lock().unwrap();
        assert_eq!(first.len(), 3);
        assert!(first[1].loading);
        assert!(first[1].data.is_empty());
        assert_eq!(first[2].data, vec![1, 2]);
    }

    sub_first.unsubscribe();
    assert_eq!(svc.subscriber_count(), 1);
    svc.refresh().await;
    assert_eq!(first.lock().unwrap().len(), 3);
    assert_eq!(second.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_total_count_falls_back_to_loaded_length() {
    let fetcher = StubFetcher::new(2, |_filters, page| match page {
        0 => Ok(Page::new(vec![1, 2], Some(0))),
        _ => Ok(Page::empty()),
    });
    let svc = service(&fetcher, config(2, 100, 0));
    svc.load_initial_data(Filters::new()).await;
    assert_eq!(svc.get_state().total_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_first_page_ends_cycle() {
    let fetcher = StubFetcher::new(2, |_filters, _page| Ok(Page::new(Vec::new(), Some(0))));
    let svc = service(&fetcher, config(2, 100, 0));
    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;

    let state = svc.get_state();
    assert!(!state.has_more);
    assert_eq!(state.current_page, 1);
    assert!(state.is_settled());
    advance(1000).await;
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_watch_receiver_tracks_latest_state() {
    let fetcher = StubFetcher::new(2, example_pages);
    let svc = service(&fetcher, config(2, 100, 0));
    let mut rx = svc.watch();
    assert_eq!(*rx.borrow(), ServiceState::default());

    svc.resume_batch_loading();
    svc.load_initial_data(Filters::new()).await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().data, vec![1, 2]);

    advance(100).await;
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().data, vec![1, 2, 3, 4]);
}

fn single_page(_filters: &Filters, page: usize) -> Result<Page<u32>, FetchError> {
    if page == 0 { Ok(Page::new(vec![1, 2], Some(2))) } else { Ok(Page::empty()) }
}

#[tokio::test(start_paused = true)]
async fn test_stopping_auto_refresh_mid_fetch_still_settles_cycle() {
    let notify = Arc::new(Notify::new());
    let fetcher = StubFetcher::gated(2, "slow", Arc::clone(&notify), single_page);
    let svc = service(&fetcher, config(2, 100, 1000));

    notify.notify_one();
    svc.load_initial_data(Filters::new().with("tenant", "slow")).await;
    assert_eq!(svc.get_state().data, vec![1, 2]);

    svc.start_auto_refresh();
    advance(1000).await;
    assert!(svc.get_state().loading);
    assert_eq!(fetcher.call_count(), 2);

    svc.stop_auto_refresh();
    notify.notify_one();
    settle().await;
    let state = svc.get_state();
    assert!(!state.loading);
    assert_eq!(state.data, vec![1, 2]);
    assert!(state.has_more);

    svc.resume_batch_loading();
    notify.notify_one();
    advance(100).await;
    let state = svc.get_state();
    assert!(!state.has_more);
    assert_eq!(fetcher.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_load_future_still_settles_cycle() {
    let notify = Arc::new(Notify::new());
    let fetcher = StubFetcher::gated(2, "slow", Arc::clone(&notify), single_page);
    let svc = service(&fetcher, config(2, 100, 0));
    let seen = record_states(&svc);

    let load = svc.load_initial_data(Filters::new().with("tenant", "slow"));
    let timed_out = tokio::time::timeout(Duration::from_millis(50), load).await;
    assert!(timed_out.is_err());
    assert!(svc.get_state().loading);

    notify.notify_one();
    settle().await;
    let state = svc.get_state();
    assert!(!state.loading);
    assert_eq!(state.data, vec![1, 2]);
    assert_eq!(seen.lock().unwrap().last(), Some(&state));
}
