use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::analyzer::DealAnalyzer;
use crate::db::models::DealRow;
use crate::db::DealStore;
use crate::error::{AppError, Result};
use crate::sources::{baseline_score, SourceAdapter};
use crate::types::{
    DealStatistics, DiscoveryStats, DiscoveryStatus, EnrichedListing, RawListing, RunOutcome,
};

/// Result of asking one adapter for listings.
#[derive(Debug)]
pub enum ScrapeOutcome {
    Listings { retailer: String, listings: Vec<RawListing> },
    Failed { retailer: String, error: AppError },
}

/// Result of persisting one accepted listing.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved { id: i64, category_created: bool },
    Failed { deal_url: String, error: AppError },
}

#[derive(Debug, Default)]
struct RunState {
    last_run: Option<DateTime<Utc>>,
    stats: DiscoveryStats,
}

/// Clears the running flag when dropped, including on unwind.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sequences adapters, analysis and persistence for one discovery pass and
/// keeps the status of the current or most recent pass.
pub struct DiscoveryManager {
    adapters: Vec<Box<dyn SourceAdapter>>,
    analyzer: DealAnalyzer,
    store: Arc<dyn DealStore>,
    running: AtomicBool,
    state: RwLock<RunState>,
}

impl DiscoveryManager {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        analyzer: DealAnalyzer,
        store: Arc<dyn DealStore>,
    ) -> Self {
        Self {
            adapters,
            analyzer,
            store,
            running: AtomicBool::new(false),
            state: RwLock::new(RunState::default()),
        }
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|a| a.retailer_name().to_string())
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One full pass over every adapter. Returns `AlreadyRunning` without
    /// doing anything if another pass is in flight.
    pub async fn run_discovery(&self) -> RunOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("Discovery already running, ignoring request");
            return RunOutcome::AlreadyRunning;
        };

        let started = Instant::now();
        self.state.write().await.stats = DiscoveryStats::default();
        info!(adapters = self.adapters.len(), "Discovery run started");

        // Stats move as each adapter returns so status polls see progress.
        let mut found = Vec::new();
        for adapter in &self.adapters {
            match Self::scrape_one(adapter.as_ref()).await {
                ScrapeOutcome::Listings { retailer, listings } => {
                    let count = listings.len();
                    info!(retailer = %retailer, count, "{retailer} returned {count} listings");
                    found.extend(listings);
                    self.update_stats(|s| s.total_deals_found += count).await;
                }
                ScrapeOutcome::Failed { retailer, error } => {
                    error!(retailer = %retailer, "Adapter {retailer} failed: {error}");
                    self.update_stats(|s| s.errors += 1).await;
                }
            }
        }

        let accepted = if found.is_empty() {
            Vec::new()
        } else {
            self.analyzer.process_deals(found).await
        };
        let total_processed = accepted.len();
        self.update_stats(|s| s.total_deals_processed = total_processed).await;

        let mut saved = 0;
        let mut save_errors = 0;
        let mut categories_created = 0;
        for outcome in self.save_all(&accepted).await {
            match outcome {
                SaveOutcome::Saved { id, category_created } => {
                    debug!(id, "Deal saved");
                    saved += 1;
                    categories_created += usize::from(category_created);
                }
                SaveOutcome::Failed { deal_url, error } => {
                    error!(deal_url = %deal_url, "Failed to save deal: {error}");
                    save_errors += 1;
                }
            }
        }
        if categories_created > 0 {
            info!(created = categories_created, "Created {categories_created} new categories");
        }

        let run_time_ms = started.elapsed().as_millis() as u64;
        let stats = {
            let mut state = self.state.write().await;
            state.stats.total_deals_saved = saved;
            state.stats.errors += save_errors;
            state.stats.run_time_ms = run_time_ms;
            state.last_run = Some(Utc::now());
            state.stats.clone()
        };

        info!(
            found = stats.total_deals_found,
            processed = stats.total_deals_processed,
            saved = stats.total_deals_saved,
            errors = stats.errors,
            run_time_ms = stats.run_time_ms,
            "Discovery run complete: {} found, {} processed, {} saved, {} errors in {}ms",
            stats.total_deals_found,
            stats.total_deals_processed,
            stats.total_deals_saved,
            stats.errors,
            stats.run_time_ms,
        );
        RunOutcome::Completed(stats)
    }

    pub async fn get_status(&self) -> DiscoveryStatus {
        let state = self.state.read().await;
        DiscoveryStatus {
            is_running: self.is_running(),
            last_run: state.last_run,
            stats: state.stats.clone(),
            adapters: self.adapter_names(),
        }
    }

    /// Run only the adapter whose name contains `name` (case-insensitive),
    /// outside the normal pipeline. Nothing is analyzed or persisted.
    pub async fn test_scraper(&self, name: &str) -> Result<Vec<RawListing>> {
        let needle = name.trim().to_lowercase();
        let adapter = self
            .adapters
            .iter()
            .find(|a| !needle.is_empty() && a.retailer_name().to_lowercase().contains(&needle))
            .ok_or_else(|| AppError::AdapterNotFound(name.to_string()))?;

        info!(
            retailer = %adapter.retailer_name(),
            base_url = %adapter.base_url(),
            pages = adapter.deal_urls().len(),
            "Testing scraper"
        );
        let listings = adapter.scrape_deals().await?;
        for listing in &listings {
            debug!(
                retailer = %listing.retailer_name,
                baseline = baseline_score(listing),
                "{}",
                listing.title
            );
        }
        info!(retailer = %adapter.retailer_name(), count = listings.len(), "Scraper test returned {} listings", listings.len());
        Ok(listings)
    }

    pub async fn get_recent_deals(&self, limit: i64) -> Result<Vec<DealRow>> {
        self.store.recent_listings(limit).await
    }

    pub async fn get_deal_statistics(&self) -> Result<DealStatistics> {
        let by_category = self.store.category_counts().await?;
        let discount = self.store.discount_summary().await?;
        let state = self.state.read().await;
        Ok(DealStatistics {
            total_active: discount.total_active,
            by_category,
            discount,
            last_run: state.last_run,
            last_run_stats: state.stats.clone(),
        })
    }

    async fn scrape_one(adapter: &dyn SourceAdapter) -> ScrapeOutcome {
        let retailer = adapter.retailer_name().to_string();
        match adapter.scrape_deals().await {
            Ok(listings) => ScrapeOutcome::Listings { retailer, listings },
            Err(error) => ScrapeOutcome::Failed { retailer, error },
        }
    }

    async fn save_all(&self, accepted: &[EnrichedListing]) -> Vec<SaveOutcome> {
        let mut outcomes = Vec::with_capacity(accepted.len());
        for listing in accepted {
            outcomes.push(match self.save_one(listing).await {
                Ok((id, category_created)) => SaveOutcome::Saved { id, category_created },
                Err(error) => SaveOutcome::Failed {
                    deal_url: listing.deal_url.clone(),
                    error,
                },
            });
        }
        outcomes
    }

    async fn save_one(&self, listing: &EnrichedListing) -> Result<(i64, bool)> {
        let category = self.store.get_or_create_category(&listing.category).await?;
        let id = self.store.insert_listing(listing, category.row().id).await?;
        debug!(id, category = %listing.category, score = listing.quality_score, "Saved '{}'", listing.title);
        Ok((id, category.was_created()))
    }

    async fn update_stats(&self, apply: impl FnOnce(&mut DiscoveryStats)) {
        let mut state = self.state.write().await;
        apply(&mut state.stats);
    }
}

impl std::fmt::Debug for DiscoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryManager")
            .field("adapters", &self.adapter_names())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::analyzer::AnalyzerConfig;
    use crate::db::models::{CategoryCount, CategoryRow, DiscountSummary, NewCategory};
    use crate::db::testing::memory_pool;
    use crate::db::SqliteDealStore;
    use crate::sources::fixture::FixtureAdapter;
    use crate::sources::listing_now;

    struct FailingAdapter;

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn retailer_name(&self) -> &str {
            "Broken Mart"
        }
        fn base_url(&self) -> &str {
            "https://broken.test"
        }
        fn deal_urls(&self) -> Vec<String> {
            vec!["https://broken.test/deals".to_string()]
        }
        async fn scrape_deals(&self) -> Result<Vec<RawListing>> {
            Err(AppError::SourceUnavailable {
                retailer: "Broken Mart".to_string(),
                pages: 1,
            })
        }
    }

    struct SlowAdapter {
        delay: Duration,
    }

    #[async_trait]
    impl SourceAdapter for SlowAdapter {
        fn retailer_name(&self) -> &str {
            "Slow Outlet"
        }
        fn base_url(&self) -> &str {
            "https://slow.test"
        }
        fn deal_urls(&self) -> Vec<String> {
            vec!["https://slow.test/deals".to_string()]
        }
        async fn scrape_deals(&self) -> Result<Vec<RawListing>> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![
                listing_now("Slow Outlet", "Bose QuietComfort Headphones", "https://slow.test/qc", 199.0, Some(349.0)),
                listing_now("Slow Outlet", "Ninja Professional Blender 1000W", "https://slow.test/ninja", 69.99, Some(119.99)),
            ])
        }
    }

    /// Delegates to SQLite but refuses to insert listings whose URL contains `fail_on`.
    struct FlakyStore {
        inner: SqliteDealStore,
        fail_on: &'static str,
    }

    #[async_trait]
    impl DealStore for FlakyStore {
        async fn find_category(&self, slug: &str) -> Result<Option<CategoryRow>> {
            self.inner.find_category(slug).await
        }
        async fn create_category(&self, category: &NewCategory) -> Result<CategoryRow> {
            self.inner.create_category(category).await
        }
        async fn title_fragment_exists(&self, fragment: &str) -> Result<bool> {
            self.inner.title_fragment_exists(fragment).await
        }
        async fn deal_url_exists(&self, deal_url: &str) -> Result<bool> {
            self.inner.deal_url_exists(deal_url).await
        }
        async fn insert_listing(&self, listing: &EnrichedListing, category_id: i64) -> Result<i64> {
            if listing.deal_url.contains(self.fail_on) {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert_listing(listing, category_id).await
        }
        async fn recent_listings(&self, limit: i64) -> Result<Vec<DealRow>> {
            self.inner.recent_listings(limit).await
        }
        async fn category_counts(&self) -> Result<Vec<CategoryCount>> {
            self.inner.category_counts().await
        }
        async fn discount_summary(&self) -> Result<DiscountSummary> {
            self.inner.discount_summary().await
        }
    }

    fn manager_with(adapters: Vec<Box<dyn SourceAdapter>>, store: Arc<dyn DealStore>) -> DiscoveryManager {
        let analyzer = DealAnalyzer::new(AnalyzerConfig::default(), Arc::clone(&store));
        DiscoveryManager::new(adapters, analyzer, store)
    }

    async fn sqlite_store() -> Arc<dyn DealStore> {
        Arc::new(SqliteDealStore::new(memory_pool().await))
    }

    fn completed(outcome: RunOutcome) -> DiscoveryStats {
        match outcome {
            RunOutcome::Completed(stats) => stats,
            RunOutcome::AlreadyRunning => panic!("expected a completed run"),
        }
    }

    #[tokio::test]
    async fn failing_adapter_does_not_stop_later_ones() {
        let manager = manager_with(
            vec![Box::new(FailingAdapter), Box::new(FixtureAdapter::new())],
            sqlite_store().await,
        );

        let stats = completed(manager.run_discovery().await);
        assert_eq!(stats.total_deals_found, 6);
        // spam and the 10% socks are rejected
        assert_eq!(stats.total_deals_processed, 4);
        assert_eq!(stats.total_deals_saved, 4);
        assert_eq!(stats.errors, 1);

        let status = manager.get_status().await;
        assert!(!status.is_running);
        assert!(status.last_run.is_some());
        assert_eq!(status.stats, stats);
        assert_eq!(status.adapters, vec!["Broken Mart", "Test Retailer"]);
    }

    #[tokio::test]
    async fn second_run_finds_only_duplicates() {
        let manager = manager_with(vec![Box::new(FixtureAdapter::new())], sqlite_store().await);
        completed(manager.run_discovery().await);

        let again = completed(manager.run_discovery().await);
        assert_eq!(again.total_deals_found, 6);
        assert_eq!(again.total_deals_processed, 0);
        assert_eq!(again.total_deals_saved, 0);
        assert_eq!(again.errors, 0);
    }

    #[tokio::test]
    async fn concurrent_run_is_a_noop() {
        let manager = Arc::new(manager_with(
            vec![Box::new(SlowAdapter { delay: Duration::from_millis(300) })],
            sqlite_store().await,
        ));

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.run_discovery().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(manager.get_status().await.is_running);
        assert_eq!(manager.run_discovery().await, RunOutcome::AlreadyRunning);

        let stats = completed(first.await.unwrap());
        assert_eq!(stats.total_deals_found, 2);
        assert_eq!(stats.total_deals_saved, 2);
        assert!(!manager.is_running());
        assert_eq!(manager.get_status().await.stats.total_deals_found, 2);
    }

    #[tokio::test]
    async fn status_shows_adapter_progress_mid_run() {
        let manager = Arc::new(manager_with(
            vec![
                Box::new(FailingAdapter),
                Box::new(FixtureAdapter::new()),
                Box::new(SlowAdapter { delay: Duration::from_millis(300) }),
            ],
            sqlite_store().await,
        ));

        let run = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.run_discovery().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = manager.get_status().await;
        assert!(status.is_running);
        assert_eq!(status.stats.errors, 1);
        assert_eq!(status.stats.total_deals_found, 6);

        let stats = completed(run.await.unwrap());
        assert_eq!(stats.total_deals_found, 8);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn deactivated_deals_can_be_rediscovered() {
        let pool = memory_pool().await;
        let manager = manager_with(
            vec![Box::new(FixtureAdapter::new())],
            Arc::new(SqliteDealStore::new(pool.clone())),
        );
        assert_eq!(completed(manager.run_discovery().await).total_deals_saved, 4);

        sqlx::query("UPDATE deals SET is_active = 0")
            .execute(&pool)
            .await
            .unwrap();

        let again = completed(manager.run_discovery().await);
        assert_eq!(again.total_deals_processed, 4);
        assert_eq!(again.total_deals_saved, 4);
        assert_eq!(again.errors, 0);
        let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE is_active = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(active, 4);
    }

    #[tokio::test]
    async fn persistence_failure_is_counted_and_skipped() {
        let store: Arc<dyn DealStore> = Arc::new(FlakyStore {
            inner: SqliteDealStore::new(memory_pool().await),
            fail_on: "kitchenaid",
        });
        let manager = manager_with(vec![Box::new(FixtureAdapter::new())], store);

        let stats = completed(manager.run_discovery().await);
        assert_eq!(stats.total_deals_processed, 4);
        assert_eq!(stats.total_deals_saved, 3);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn statistics_reflect_saved_deals() {
        let manager = manager_with(vec![Box::new(FixtureAdapter::new())], sqlite_store().await);
        completed(manager.run_discovery().await);

        let stats = manager.get_deal_statistics().await.unwrap();
        assert_eq!(stats.total_active, 4);
        assert_eq!(stats.last_run_stats.total_deals_saved, 4);
        assert!(stats.last_run.is_some());
        assert_eq!(stats.discount.max_discount, Some(55));
        let home = stats.by_category.iter().find(|c| c.slug == "home-garden").unwrap();
        assert_eq!(home.deal_count, 2);
        assert_eq!(home.name, "Home Garden");

        let recent = manager.get_recent_deals(10).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert!(recent.iter().all(|d| d.retailer_name == "Test Retailer"));
    }

    #[tokio::test]
    async fn test_scraper_matches_by_substring() {
        let manager = manager_with(
            vec![Box::new(FailingAdapter), Box::new(FixtureAdapter::new())],
            sqlite_store().await,
        );

        let listings = manager.test_scraper("RETAIL").await.unwrap();
        assert_eq!(listings.len(), 6);
        // diagnostics never persist anything
        assert!(manager.get_recent_deals(10).await.unwrap().is_empty());

        assert!(matches!(
            manager.test_scraper("costco").await,
            Err(AppError::AdapterNotFound(_))
        ));
        assert!(matches!(
            manager.test_scraper("broken").await,
            Err(AppError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn no_adapters_completes_empty() {
        let manager = manager_with(Vec::new(), sqlite_store().await);
        let stats = completed(manager.run_discovery().await);
        assert_eq!(stats.total_deals_found, 0);
        assert_eq!(stats.total_deals_saved, 0);
    }
}
