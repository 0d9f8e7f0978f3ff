//! Validation, duplicate suppression, scoring and categorization of raw
//! listings. The analyzer holds immutable tables and a store handle; it never
//! writes to the store.

pub mod classifier;
pub mod scoring;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::{analyzer_defaults, Config};
use crate::db::DealStore;
use crate::sources::discount_percentage;
use crate::types::{EnrichedListing, QualityLevel, RawListing};

use self::classifier::{categorize, is_known_slug, CategoryKeywords, OTHER};
use self::scoring::ScoreInput;

/// Title phrases that mark a listing as spam (matched case-insensitively).
const SPAM_PHRASES: &[&str] = &[
    "click here",
    "get rich",
    "bitcoin",
    "crypto",
    "free money",
    "make money fast",
    "work from home",
    "casino",
    "viagra",
    "100% free",
    "act now",
];

/// Retailer-name substrings and their reputation points (10..=20).
const REPUTATION: &[(&str, u8)] = &[
    ("amazon", 18),
    ("best buy", 17),
    ("bestbuy", 17),
    ("costco", 17),
    ("walmart", 16),
    ("target", 16),
    ("newegg", 15),
    ("home depot", 15),
    ("macy", 13),
    ("ebay", 12),
];

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub min_price: f64,
    pub max_price: f64,
    pub min_discount: u8,
    pub min_title_chars: usize,
    pub max_title_chars: usize,
    pub duplicate_prefix_chars: usize,
    pub spam_phrases: Vec<String>,
    pub reputation: Vec<(String, u8)>,
    pub categories: Vec<CategoryKeywords>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_price: analyzer_defaults::MIN_PRICE,
            max_price: analyzer_defaults::MAX_PRICE,
            min_discount: analyzer_defaults::MIN_DISCOUNT,
            min_title_chars: analyzer_defaults::MIN_TITLE_CHARS,
            max_title_chars: analyzer_defaults::MAX_TITLE_CHARS,
            duplicate_prefix_chars: analyzer_defaults::DUPLICATE_PREFIX_CHARS,
            spam_phrases: SPAM_PHRASES.iter().map(|p| p.to_string()).collect(),
            reputation: REPUTATION.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            categories: classifier::default_categories(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults with the env-tunable thresholds taken from `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            min_price: cfg.min_price,
            max_price: cfg.max_price,
            min_discount: cfg.min_discount,
            ..Self::default()
        }
    }
}

/// Why a listing was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingTitle,
    MissingSalePrice,
    MissingRetailer,
    PriceOutOfRange(f64),
    DiscountBelowMinimum(u8),
    TitleLength(usize),
    Spam(String),
    DuplicateTitle,
    DuplicateUrl,
    DuplicateInBatch,
    /// The duplicate lookup itself failed.
    Store(String),
}

impl Rejection {
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Rejection::DuplicateTitle | Rejection::DuplicateUrl | Rejection::DuplicateInBatch
        )
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingTitle => write!(f, "missing title"),
            Rejection::MissingSalePrice => write!(f, "missing sale price"),
            Rejection::MissingRetailer => write!(f, "missing retailer"),
            Rejection::PriceOutOfRange(p) => write!(f, "price {p:.2} outside window"),
            Rejection::DiscountBelowMinimum(d) => write!(f, "discount {d}% below minimum"),
            Rejection::TitleLength(n) => write!(f, "title length {n} out of bounds"),
            Rejection::Spam(phrase) => write!(f, "spam phrase '{phrase}'"),
            Rejection::DuplicateTitle => write!(f, "duplicate title"),
            Rejection::DuplicateUrl => write!(f, "duplicate deal url"),
            Rejection::DuplicateInBatch => write!(f, "duplicate within batch"),
            Rejection::Store(e) => write!(f, "store lookup failed: {e}"),
        }
    }
}

pub struct DealAnalyzer {
    config: AnalyzerConfig,
    store: Arc<dyn DealStore>,
}

impl DealAnalyzer {
    pub fn new(config: AnalyzerConfig, store: Arc<dyn DealStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Run one listing through the pipeline. Rejections, including store
    /// failures during the duplicate check, are logged and yield None.
    pub async fn analyze_deal(&self, raw: &RawListing) -> Option<EnrichedListing> {
        match self.evaluate(raw).await {
            Ok(enriched) => Some(enriched),
            Err(rejection) => {
                log_rejection(raw, &rejection);
                None
            }
        }
    }

    /// Analyze every listing, keeping accepted ones in input order. A listing
    /// whose URL or title prefix matches one already accepted in this batch
    /// is dropped as a duplicate.
    pub async fn process_deals(&self, raws: Vec<RawListing>) -> Vec<EnrichedListing> {
        let total = raws.len();
        let mut accepted = Vec::with_capacity(total);
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_prefixes: HashSet<String> = HashSet::new();

        for raw in &raws {
            let Some(enriched) = self.analyze_deal(raw).await else {
                continue;
            };
            let prefix = self.title_prefix(&enriched.title);
            if seen_urls.contains(&enriched.deal_url) || seen_prefixes.contains(&prefix) {
                log_rejection(raw, &Rejection::DuplicateInBatch);
                continue;
            }
            seen_urls.insert(enriched.deal_url.clone());
            seen_prefixes.insert(prefix);
            accepted.push(enriched);
        }

        info!(
            received = total,
            accepted = accepted.len(),
            "Analyzed {} listings, accepted {}",
            total,
            accepted.len()
        );
        accepted
    }

    async fn evaluate(&self, raw: &RawListing) -> Result<EnrichedListing, Rejection> {
        let (title, sale_price, discount) = self.validate(raw)?;
        self.check_duplicates(title, &raw.deal_url).await?;

        let now = Utc::now();
        let breakdown = scoring::score(
            &ScoreInput {
                discount_percentage: discount,
                value_price: raw.original_price.filter(|o| *o > 0.0).unwrap_or(sale_price),
                retailer_name: &raw.retailer_name,
                found_at: raw.found_at,
                in_stock: raw.in_stock,
                limited_stock: raw.limited_stock,
            },
            &self.config.reputation,
            now,
        );
        debug!(
            title = %title,
            discount = breakdown.discount,
            price = breakdown.price,
            reputation = breakdown.reputation,
            freshness = breakdown.freshness,
            stock = breakdown.stock,
            total = breakdown.total,
            "Scored listing"
        );

        Ok(EnrichedListing {
            title: title.to_string(),
            description: raw.description.clone(),
            sale_price,
            original_price: raw.original_price,
            discount_percentage: discount,
            image_url: raw.image_url.clone(),
            deal_url: raw.deal_url.clone(),
            retailer_name: raw.retailer_name.clone(),
            in_stock: raw.in_stock,
            limited_stock: raw.limited_stock,
            found_at: raw.found_at,
            quality_score: breakdown.total,
            quality_level: QualityLevel::from_score(breakdown.total),
            category: self.category_for(title, raw),
            analyzed_at: now,
            is_active: true,
        })
    }

    /// Structural checks. Returns the trimmed title, sale price and resolved discount.
    fn validate<'a>(&self, raw: &'a RawListing) -> Result<(&'a str, f64, u8), Rejection> {
        let title = raw.title.trim();
        if title.is_empty() {
            return Err(Rejection::MissingTitle);
        }
        let sale_price = raw
            .sale_price
            .filter(|p| p.is_finite())
            .ok_or(Rejection::MissingSalePrice)?;
        if raw.retailer_name.trim().is_empty() {
            return Err(Rejection::MissingRetailer);
        }
        if sale_price < self.config.min_price || sale_price > self.config.max_price {
            return Err(Rejection::PriceOutOfRange(sale_price));
        }

        let discount = resolve_discount(raw, sale_price);
        if discount < self.config.min_discount {
            return Err(Rejection::DiscountBelowMinimum(discount));
        }

        let length = title.chars().count();
        if length < self.config.min_title_chars || length > self.config.max_title_chars {
            return Err(Rejection::TitleLength(length));
        }

        let lower = title.to_lowercase();
        if let Some(phrase) = self
            .config
            .spam_phrases
            .iter()
            .find(|p| lower.contains(p.to_lowercase().as_str()))
        {
            return Err(Rejection::Spam(phrase.clone()));
        }

        Ok((title, sale_price, discount))
    }

    async fn check_duplicates(&self, title: &str, deal_url: &str) -> Result<(), Rejection> {
        let prefix = self.title_prefix(title);
        let title_hit = self
            .store
            .title_fragment_exists(&prefix)
            .await
            .map_err(|e| Rejection::Store(e.to_string()))?;
        if title_hit {
            return Err(Rejection::DuplicateTitle);
        }
        let url_hit = self
            .store
            .deal_url_exists(deal_url)
            .await
            .map_err(|e| Rejection::Store(e.to_string()))?;
        if url_hit {
            return Err(Rejection::DuplicateUrl);
        }
        Ok(())
    }

    fn category_for(&self, title: &str, raw: &RawListing) -> String {
        let text = match raw.description.as_deref() {
            Some(description) => format!("{title} {description}"),
            None => title.to_string(),
        };
        let slug = categorize(&text, &self.config.categories);
        if slug != OTHER {
            return slug.to_string();
        }
        match raw.category_hint.as_deref() {
            Some(hint) if hint != OTHER && is_known_slug(hint, &self.config.categories) => {
                hint.to_string()
            }
            _ => OTHER.to_string(),
        }
    }

    fn title_prefix(&self, title: &str) -> String {
        title.trim().chars().take(self.config.duplicate_prefix_chars).collect()
    }
}

/// Recomputed from the price pair when both are known, else the adapter's figure.
fn resolve_discount(raw: &RawListing, sale_price: f64) -> u8 {
    raw.original_price
        .and_then(|original| discount_percentage(sale_price, original))
        .or(raw.discount_percentage.map(|d| d.min(100)))
        .unwrap_or(0)
}

fn log_rejection(raw: &RawListing, rejection: &Rejection) {
    match rejection {
        Rejection::Store(_) => {
            error!(deal_url = %raw.deal_url, "Analysis failed for '{}': {rejection}", raw.title)
        }
        r if r.is_duplicate() => {
            info!(deal_url = %raw.deal_url, "Skipping duplicate '{}': {rejection}", raw.title)
        }
        _ => debug!(deal_url = %raw.deal_url, "Rejected '{}': {rejection}", raw.title),
    }
}
