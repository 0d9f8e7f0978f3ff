use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::db::models::{CategoryCount, CategoryRow, DealRow, DiscountSummary, NewCategory};
use crate::error::Result;
use crate::types::EnrichedListing;

/// How `get_or_create_category` resolved a slug.
#[derive(Debug, Clone)]
pub enum CategoryResolution {
    Existing(CategoryRow),
    Created(CategoryRow),
}

impl CategoryResolution {
    pub fn row(&self) -> &CategoryRow {
        match self {
            CategoryResolution::Existing(row) | CategoryResolution::Created(row) => row,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CategoryResolution::Created(_))
    }
}

/// Persistence operations the discovery pipeline depends on.
/// The pipeline only ever inserts; it never updates or deletes rows.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn find_category(&self, slug: &str) -> Result<Option<CategoryRow>>;

    async fn create_category(&self, category: &NewCategory) -> Result<CategoryRow>;

    /// True if any active deal's stored name contains `fragment`.
    async fn title_fragment_exists(&self, fragment: &str) -> Result<bool>;

    /// True if any active deal has exactly this URL.
    async fn deal_url_exists(&self, deal_url: &str) -> Result<bool>;

    /// Insert an accepted listing under `category_id`, returning the new row id.
    async fn insert_listing(&self, listing: &EnrichedListing, category_id: i64) -> Result<i64>;

    async fn recent_listings(&self, limit: i64) -> Result<Vec<DealRow>>;

    async fn category_counts(&self) -> Result<Vec<CategoryCount>>;

    async fn discount_summary(&self) -> Result<DiscountSummary>;

    /// Look the slug up; create it with a title-cased name only when absent.
    async fn get_or_create_category(&self, slug: &str) -> Result<CategoryResolution> {
        if let Some(existing) = self.find_category(slug).await? {
            return Ok(CategoryResolution::Existing(existing));
        }
        let created = self.create_category(&NewCategory::from_slug(slug)).await?;
        info!(slug = %created.slug, name = %created.name, id = created.id, "Created category {}", created.slug);
        Ok(CategoryResolution::Created(created))
    }
}

/// SQLite-backed store. Category rows are cached by slug once seen, since
/// they are never deleted or renamed by this service.
pub struct SqliteDealStore {
    pool: sqlx::SqlitePool,
    categories: DashMap<String, CategoryRow>,
}

const CATEGORY_COLUMNS: &str = "id, name, slug, description, is_active, created_at";

impl SqliteDealStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            pool,
            categories: DashMap::new(),
        }
    }

    async fn fetch_category(&self, slug: &str) -> Result<Option<CategoryRow>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl DealStore for SqliteDealStore {
    async fn find_category(&self, slug: &str) -> Result<Option<CategoryRow>> {
        if let Some(cached) = self.categories.get(slug) {
            return Ok(Some(cached.clone()));
        }
        let row = self.fetch_category(slug).await?;
        if let Some(ref row) = row {
            self.categories.insert(row.slug.clone(), row.clone());
        }
        Ok(row)
    }

    async fn create_category(&self, category: &NewCategory) -> Result<CategoryRow> {
        sqlx::query(
            r#"
            INSERT INTO categories (name, slug, description, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let row = self
            .fetch_category(&category.slug)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        self.categories.insert(row.slug.clone(), row.clone());
        Ok(row)
    }

    async fn title_fragment_exists(&self, fragment: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM deals WHERE is_active = 1 AND instr(name, ?) > 0)",
        )
        .bind(fragment)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn deal_url_exists(&self, deal_url: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM deals WHERE is_active = 1 AND deal_url = ?)",
        )
        .bind(deal_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(found != 0)
    }

    async fn insert_listing(&self, listing: &EnrichedListing, category_id: i64) -> Result<i64> {
        let quality_level = listing.quality_level.to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO deals (
                category_id, name, description, sale_price, original_price,
                discount_percentage, image_url, deal_url, retailer_name,
                in_stock, limited_stock, quality_score, quality_level,
                is_active, found_at, analyzed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(category_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.sale_price)
        .bind(listing.original_price)
        .bind(i64::from(listing.discount_percentage))
        .bind(&listing.image_url)
        .bind(&listing.deal_url)
        .bind(&listing.retailer_name)
        .bind(listing.in_stock)
        .bind(listing.limited_stock)
        .bind(i64::from(listing.quality_score))
        .bind(quality_level)
        .bind(listing.is_active)
        .bind(listing.found_at)
        .bind(listing.analyzed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_listings(&self, limit: i64) -> Result<Vec<DealRow>> {
        let rows = sqlx::query_as::<_, DealRow>(
            r#"
            SELECT d.id, d.category_id, c.slug AS category_slug, d.name, d.description,
                   d.sale_price, d.original_price, d.discount_percentage, d.image_url,
                   d.deal_url, d.retailer_name, d.in_stock, d.limited_stock,
                   d.quality_score, d.quality_level, d.click_count, d.is_active,
                   d.found_at, d.analyzed_at, d.created_at
            FROM deals d
            JOIN categories c ON c.id = d.category_id
            WHERE d.is_active = 1
            ORDER BY d.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn category_counts(&self) -> Result<Vec<CategoryCount>> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT c.slug, c.name, COUNT(d.id) AS deal_count
            FROM categories c
            JOIN deals d ON d.category_id = c.id AND d.is_active = 1
            GROUP BY c.id, c.slug, c.name
            ORDER BY deal_count DESC, c.slug ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn discount_summary(&self) -> Result<DiscountSummary> {
        let summary = sqlx::query_as::<_, DiscountSummary>(
            r#"
            SELECT COUNT(*) AS total_active,
                   AVG(CAST(discount_percentage AS REAL)) AS average_discount,
                   MAX(discount_percentage) AS max_discount
            FROM deals
            WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::testing::memory_pool;
    use crate::types::QualityLevel;

    fn enriched(title: &str, url: &str, discount: u8, category: &str) -> EnrichedListing {
        EnrichedListing {
            title: title.to_string(),
            description: None,
            sale_price: 100.0,
            original_price: Some(200.0),
            discount_percentage: discount,
            image_url: None,
            deal_url: url.to_string(),
            retailer_name: "Amazon".to_string(),
            in_stock: true,
            limited_stock: false,
            found_at: Utc::now(),
            quality_score: 70,
            quality_level: QualityLevel::Good,
            category: category.to_string(),
            analyzed_at: Utc::now(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn get_or_create_distinguishes_paths() {
        let store = SqliteDealStore::new(memory_pool().await);

        let first = store.get_or_create_category("home-garden").await.unwrap();
        assert!(first.was_created());
        assert_eq!(first.row().name, "Home Garden");

        let second = store.get_or_create_category("home-garden").await.unwrap();
        assert!(!second.was_created());
        assert_eq!(second.row().id, first.row().id);
    }

    #[tokio::test]
    async fn create_category_is_idempotent_on_slug() {
        let store = SqliteDealStore::new(memory_pool().await);
        let a = store.create_category(&NewCategory::from_slug("pets")).await.unwrap();
        let b = store.create_category(&NewCategory::from_slug("pets")).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn duplicate_lookups() {
        let store = SqliteDealStore::new(memory_pool().await);
        let cat = store.get_or_create_category("home-garden").await.unwrap();
        let listing = enriched(
            "KitchenAid Stand Mixer 5-Quart Artisan Series Tilt-Head, Empire Red",
            "https://shop.test/mixer",
            46,
            "home-garden",
        );
        store.insert_listing(&listing, cat.row().id).await.unwrap();

        assert!(store.deal_url_exists("https://shop.test/mixer").await.unwrap());
        assert!(!store.deal_url_exists("https://shop.test/other").await.unwrap());
        assert!(store.title_fragment_exists("KitchenAid Stand Mixer 5-Quart").await.unwrap());
        assert!(!store.title_fragment_exists("kitchenaid stand mixer").await.unwrap());
    }

    #[tokio::test]
    async fn deal_url_is_unique() {
        let store = SqliteDealStore::new(memory_pool().await);
        let cat = store.get_or_create_category("pets").await.unwrap();
        let listing = enriched("Automatic Cat Feeder 4L", "https://shop.test/feeder", 30, "pets");
        store.insert_listing(&listing, cat.row().id).await.unwrap();
        assert!(store.insert_listing(&listing, cat.row().id).await.is_err());
    }

    #[tokio::test]
    async fn statistics_queries() {
        let store = SqliteDealStore::new(memory_pool().await);
        let empty = store.discount_summary().await.unwrap();
        assert_eq!(empty.total_active, 0);
        assert!(empty.average_discount.is_none());

        let pets = store.get_or_create_category("pets").await.unwrap();
        let tech = store.get_or_create_category("tech-electronics").await.unwrap();
        for (i, pct) in [30u8, 50].iter().enumerate() {
            let l = enriched(&format!("Dog Bed Orthopedic {i}"), &format!("https://shop.test/bed/{i}"), *pct, "pets");
            store.insert_listing(&l, pets.row().id).await.unwrap();
        }
        let tv = enriched("OLED Television 65 inch", "https://shop.test/tv", 70, "tech-electronics");
        store.insert_listing(&tv, tech.row().id).await.unwrap();

        let summary = store.discount_summary().await.unwrap();
        assert_eq!(summary.total_active, 3);
        assert_eq!(summary.max_discount, Some(70));
        assert!((summary.average_discount.unwrap() - 50.0).abs() < 1e-9);

        let counts = store.category_counts().await.unwrap();
        assert_eq!(counts[0].slug, "pets");
        assert_eq!(counts[0].deal_count, 2);
        assert_eq!(counts[1].slug, "tech-electronics");

        let recent = store.recent_listings(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].deal_url, "https://shop.test/tv");
        assert_eq!(recent[0].category_slug, "tech-electronics");
        assert_eq!(recent[0].click_count, 0);
        assert_eq!(recent[0].quality_level, "good");
    }
}
