use std::time::Duration;

use adoption_insights_client::InsightsClient;
use adoption_insights_core::{BatchLoadConfig, EntityType, Filters};
use adoption_insights_service::IncrementalDataService;
use anyhow::{bail, Result};

pub(crate) struct WatchOptions {
    pub(crate) batch_size: Option<usize>,
    pub(crate) delay_ms: Option<u64>,
    pub(crate) auto_refresh: bool,
    pub(crate) max_pages: Option<usize>,
    pub(crate) print_records: bool,
}

pub(crate) async fn run(entity: EntityType, filters: Filters, options: WatchOptions) -> Result<()> {
    let mut config = BatchLoadConfig::from_env();
    if let Some(batch_size) = options.batch_size {
        config = config.with_batch_size(batch_size)?;
    }
    if let Some(delay_ms) = options.delay_ms {
        config = config.with_delay(Duration::from_millis(delay_ms));
    }

    let client = InsightsClient::from_env()?;
    tracing::info!(%entity, base_url = client.base_url(), "watching insights");
    let service: IncrementalDataService<serde_json::Value> =
        IncrementalDataService::new(entity, client, config);

    service
        .subscribe(|state| {
            tracing::info!(
                records = state.data.len(),
                page = state.current_page,
                total = state.total_count,
                has_more = state.has_more,
                loading = state.loading,
                "state published"
            );
        })
        .detach();

    let mut rx = service.watch();
    service.resume_batch_loading();
    if options.auto_refresh {
        service.start_auto_refresh();
    }
    service.load_initial_data(filters).await;

    loop {
        let (settled, failed, pages) = {
            let state = rx.borrow_and_update();
            (state.is_settled(), state.error.is_some(), state.current_page)
        };
        let page_limit_hit = options.max_pages.is_some_and(|max| pages >= max);
        if !options.auto_refresh && (settled || failed || page_limit_hit) {
            break;
        }
        if options.auto_refresh {
            match batch_action(page_limit_hit, service.is_batch_loading_paused()) {
                BatchAction::Pause => service.pause_batch_loading(),
                BatchAction::Resume => service.resume_batch_loading(),
                BatchAction::Keep => {},
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                break;
            },
        }
    }

    let state = service.get_state();
    service.destroy();

    if options.print_records {
        println!("{}", serde_json::to_string_pretty(&state.data)?);
    } else {
        let summary = serde_json::json!({
            "entity": entity,
            "records": state.data.len(),
            "pages": state.current_page,
            "totalCount": state.total_count,
            "complete": !state.has_more,
            "error": state.error,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if let Some(error) = state.error {
        bail!("loading failed: {error}");
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum BatchAction {
    Pause,
    Resume,
    Keep,
}

/// With auto-refresh the page limit applies per cycle: a refresh resets the
/// page count, so loading paused by the limit is resumed.
fn batch_action(page_limit_hit: bool, paused: bool) -> BatchAction {
    match (page_limit_hit, paused) {
        (true, false) => BatchAction::Pause,
        (false, true) => BatchAction::Resume,
        _ => BatchAction::Keep,
    }
}
