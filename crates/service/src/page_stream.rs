//! Pull-based page iteration.
//!
//! Yields pages on demand instead of on a timer; how long to wait between
//! pages is left to the caller.

use std::sync::Arc;

use adoption_insights_core::{
    BatchLoadConfig, EntityType, FetchError, Filters, InsightFetcher, PageRange,
};
use futures_util::stream::{self, Stream};

pub struct PageStream<T: Send + 'static> {
    fetcher: Arc<dyn InsightFetcher<T>>,
    entity: EntityType,
    filters: Filters,
    batch_size: usize,
    next_page: usize,
    total_count: Option<usize>,
    done: bool,
}

impl<T: Send + 'static> PageStream<T> {
    pub fn new<F>(fetcher: F, entity: EntityType, filters: Filters, config: &BatchLoadConfig) -> Self
    where
        F: InsightFetcher<T> + 'static,
    {
        Self {
            fetcher: Arc::new(fetcher),
            entity,
            filters,
            batch_size: config.batch_size(),
            next_page: 0,
            total_count: None,
            done: false,
        }
    }

    /// Fetches the next page.
    ///
    /// Returns `None` once a page came back empty. After a failure the error
    /// is yielded once and the stream ends.
    pub async fn next_page(&mut self) -> Option<Result<Vec<T>, FetchError>> {
        if self.done {
            return None;
        }
        let range = PageRange::for_page(self.next_page, self.batch_size);
        match self.fetcher.fetch(self.entity, &self.filters, range).await {
            Ok(page) => {
                if self.next_page == 0 {
                    self.total_count = page.total_count;
                }
                if page.records.is_empty() {
                    self.done = true;
                    return None;
                }
                self.next_page = self.next_page.saturating_add(1);
                Some(Ok(page.records))
            },
            Err(err) => {
                tracing::warn!(entity = %self.entity, page = self.next_page, error = %err, "page stream fetch failed");
                self.done = true;
                Some(Err(err))
            },
        }
    }

    /// Drains every remaining page into one vector.
    ///
    /// # Errors
    /// Returns the first fetch failure; records loaded before it are dropped.
    pub async fn collect_all(mut self) -> Result<Vec<T>, FetchError> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await {
            records.extend(page?);
        }
        Ok(records)
    }

    /// Adapts this iterator into a [`Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>, FetchError>> + Send {
        stream::unfold(self, |mut pages| async move {
            let item = pages.next_page().await?;
            Some((item, pages))
        })
    }

    /// Pages yielded so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.next_page
    }

    /// Total reported with the first page, if any.
    #[must_use]
    pub const fn total_count(&self) -> Option<usize> {
        self.total_count
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}
