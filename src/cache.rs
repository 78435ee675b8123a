use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::db::models::{Category, DashboardStats, Listing};

/// How long a cached listing page is served.
pub const PAGE_TTL: Duration = Duration::from_secs(300);

/// How long the admin dashboard counters are served.
pub const STATS_TTL: Duration = Duration::from_secs(60);

const MAX_CACHED_PAGES: u64 = 1_000;

/// One page of a category together with the category's total size.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: u64,
}

/// In-process cache for public listing pages and dashboard counters.
///
/// Cloning is cheap; clones share the same storage.
#[derive(Clone)]
pub struct ContentCache {
    pages: Cache<(Category, u64), Arc<ListingPage>>,
    stats: Cache<(), DashboardStats>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(PAGE_TTL, STATS_TTL)
    }
}

impl ContentCache {
    pub fn new(page_ttl: Duration, stats_ttl: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(page_ttl)
            .build();
        let stats = Cache::builder()
            .max_capacity(1)
            .time_to_live(stats_ttl)
            .build();

        debug!(
            "ContentCache initialized with page TTL {}s, stats TTL {}s",
            page_ttl.as_secs(),
            stats_ttl.as_secs()
        );
        Self { pages, stats }
    }

    pub async fn page(&self, category: Category, page: u64) -> Option<Arc<ListingPage>> {
        self.pages.get(&(category, page)).await
    }

    pub async fn store_page(&self, category: Category, page: u64, value: ListingPage) -> Arc<ListingPage> {
        let value = Arc::new(value);
        self.pages.insert((category, page), value.clone()).await;
        value
    }

    pub async fn stats(&self) -> Option<DashboardStats> {
        self.stats.get(&()).await
    }

    pub async fn store_stats(&self, stats: DashboardStats) {
        self.stats.insert((), stats).await;
    }

    /// Drop every cached entry. Called after any content change.
    pub fn invalidate_all(&self) {
        self.pages.invalidate_all();
        self.stats.invalidate_all();
        debug!("content cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(title: &str) -> ListingPage {
        ListingPage {
            items: vec![Listing::new(title, "", "")],
            total: 1,
        }
    }

    #[tokio::test]
    async fn test_pages_are_keyed_by_category_and_number() {
        let cache = ContentCache::default();
        cache.store_page(Category::Jobs, 1, page_with("Acme")).await;

        assert_eq!(cache.page(Category::Jobs, 1).await.unwrap().items[0].title, "Acme");
        assert!(cache.page(Category::Jobs, 2).await.is_none());
        assert!(cache.page(Category::Courses, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_pages_and_stats() {
        let cache = ContentCache::default();
        cache.store_page(Category::Jobs, 1, page_with("Acme")).await;
        cache
            .store_stats(DashboardStats {
                total_users: 3,
                ..Default::default()
            })
            .await;
        assert_eq!(cache.stats().await.unwrap().total_users, 3);

        cache.invalidate_all();

        assert!(cache.page(Category::Jobs, 1).await.is_none());
        assert!(cache.stats().await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = ContentCache::new(Duration::from_millis(50), Duration::from_millis(50));
        cache.store_page(Category::Jobs, 1, page_with("Acme")).await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.page(Category::Jobs, 1).await.is_none());
    }
}
