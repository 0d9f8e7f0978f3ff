use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{CategoryCount, DiscountSummary};

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// A candidate deal as extracted by an adapter. Lives only for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub description: Option<String>,
    pub sale_price: Option<f64>,
    pub original_price: Option<f64>,
    /// Reported by the adapter; recomputed from the price pair when both are known.
    pub discount_percentage: Option<u8>,
    pub image_url: Option<String>,
    pub deal_url: String,
    pub retailer_name: String,
    pub in_stock: bool,
    pub limited_stock: bool,
    pub found_at: DateTime<Utc>,
    /// Coarse keyword category from the adapter, used when analysis yields `other`.
    pub category_hint: Option<String>,
}

impl RawListing {
    /// Empty listing for `retailer` found now; adapters fill in the rest.
    pub fn new(retailer: &str, title: impl Into<String>, deal_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            sale_price: None,
            original_price: None,
            discount_percentage: None,
            image_url: None,
            deal_url: deal_url.into(),
            retailer_name: retailer.to_string(),
            in_stock: true,
            limited_stock: false,
            found_at: Utc::now(),
            category_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            QualityLevel::Excellent
        } else if score >= 60 {
            QualityLevel::Good
        } else if score >= 40 {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
        };
        write!(f, "{s}")
    }
}

/// A listing that passed validation, duplicate checks, scoring and categorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedListing {
    pub title: String,
    pub description: Option<String>,
    pub sale_price: f64,
    pub original_price: Option<f64>,
    pub discount_percentage: u8,
    pub image_url: Option<String>,
    pub deal_url: String,
    pub retailer_name: String,
    pub in_stock: bool,
    pub limited_stock: bool,
    pub found_at: DateTime<Utc>,
    pub quality_score: u8,
    pub quality_level: QualityLevel,
    /// Category slug; always a known slug or `other`.
    pub category: String,
    pub analyzed_at: DateTime<Utc>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStats {
    pub total_deals_found: usize,
    pub total_deals_processed: usize,
    pub total_deals_saved: usize,
    pub errors: usize,
    pub run_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryStatus {
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub stats: DiscoveryStats,
    pub adapters: Vec<String>,
}

/// Result of asking the manager for a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "stats", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(DiscoveryStats),
    /// A pass was already in flight; nothing was started.
    AlreadyRunning,
}

#[derive(Debug, Clone, Serialize)]
pub struct DealStatistics {
    pub total_active: i64,
    pub by_category: Vec<CategoryCount>,
    pub discount: DiscountSummary,
    pub last_run: Option<DateTime<Utc>>,
    pub last_run_stats: DiscoveryStats,
}
