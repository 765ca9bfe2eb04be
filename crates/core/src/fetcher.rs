//! The fetch seam between the loader and the backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::EntityType;
use crate::error::FetchError;
use crate::filters::Filters;
use crate::page::{Page, PageRange};

/// Fetches one page of insight records for an entity type.
///
/// Implementations must fail with a message containing "401",
/// "Authentication required" or "Token has expired" when the credential is
/// rejected. Returning an empty page signals exhaustion.
#[async_trait]
pub trait InsightFetcher<T: Send + 'static>: Send + Sync {
    async fn fetch(
        &self,
        entity: EntityType,
        filters: &Filters,
        range: PageRange,
    ) -> Result<Page<T>, FetchError>;
}

#[async_trait]
impl<T, F> InsightFetcher<T> for Arc<F>
where
    T: Send + 'static,
    F: InsightFetcher<T> + ?Sized,
{
    async fn fetch(
        &self,
        entity: EntityType,
        filters: &Filters,
        range: PageRange,
    ) -> Result<Page<T>, FetchError> {
        (**self).fetch(entity, filters, range).await
    }
}

/// Token storage the fetch layer reads credentials from.
///
/// The loader never touches it; only the REST client does.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn clear(&self);
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: std::sync::RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self { token: std::sync::RwLock::new(token) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    fn set(&self, token: String) {
        *self.token.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token);
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl InsightFetcher<u32> for Fixed {
        async fn fetch(
            &self,
            _entity: EntityType,
            _filters: &Filters,
            range: PageRange,
        ) -> Result<Page<u32>, FetchError> {
            let records = (range.start..range.end).map(|i| i as u32).collect();
            Ok(Page::new(records, None))
        }
    }

    #[tokio::test]
    async fn test_arc_fetcher_delegates() {
        let fetcher: Arc<dyn InsightFetcher<u32>> = Arc::new(Fixed);
        let page = fetcher
            .fetch(EntityType::User, &Filters::new(), PageRange::for_page(1, 3))
            .await
            .unwrap();
        assert_eq!(page.records, vec![3, 4, 5]);
    }

    #[test]
    fn test_memory_credential_store() {
        let store = MemoryCredentialStore::new(None);
        assert_eq!(store.get(), None);
        store.set("abc".to_owned());
        assert_eq!(store.get().as_deref(), Some("abc"));
        store.clear();
        assert_eq!(store.get(), None);
    }
}
