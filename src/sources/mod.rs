//! Retail source adapters.
//!
//! Every source implements [`SourceAdapter`]. Live adapters share the
//! selector-driven extractor in [`site`] and fetch pages through a
//! [`PageFetcher`]; the [`fixture`] adapter returns a static set of listings
//! and never touches the network.

pub mod amazon;
pub mod bestbuy;
pub mod fetch;
pub mod fixture;
pub mod site;
pub mod walmart;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::ScrapeSettings;
use crate::error::Result;
use crate::types::RawListing;

pub use fetch::{HttpPageFetcher, PageFetcher};

/// Capability contract for one retail source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Display name, also used for reputation scoring and test lookups.
    fn retailer_name(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Pages visited by `scrape_deals`, in visit order.
    fn deal_urls(&self) -> Vec<String>;

    /// Fetch every page in `deal_urls()` and extract candidate listings.
    ///
    /// Malformed items and unreachable pages are logged and skipped. An error
    /// is returned only when the source could not be reached at all.
    async fn scrape_deals(&self) -> Result<Vec<RawListing>>;
}

/// Build the adapters named in `names`, preserving their order.
/// Unknown names are logged and skipped.
pub fn build_adapters(
    names: &[String],
    fetcher: Arc<dyn PageFetcher>,
    settings: &ScrapeSettings,
) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::with_capacity(names.len());
    for name in names {
        match name.as_str() {
            "amazon" => adapters.push(Box::new(amazon::AmazonAdapter::new(
                Arc::clone(&fetcher),
                settings.clone(),
            )?)),
            "bestbuy" | "best-buy" => adapters.push(Box::new(bestbuy::BestBuyAdapter::new(
                Arc::clone(&fetcher),
                settings.clone(),
            )?)),
            "walmart" => adapters.push(Box::new(walmart::WalmartAdapter::new(
                Arc::clone(&fetcher),
                settings.clone(),
            )?)),
            "fixture" | "test" => adapters.push(Box::new(fixture::FixtureAdapter::new())),
            other => warn!(source = %other, "Unknown discovery source, skipping"),
        }
    }
    Ok(adapters)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Parse a price out of currency-formatted text such as `"$1,299.99"` or
/// `"Now $49.99"`. Symbols and thousands separators are ignored; the first
/// number wins. Returns None when no usable number is present.
pub fn parse_price(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != ',')
        .collect();
    number
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
}

/// `round((original - sale) / original * 100)`, clamped to 0..=100.
/// None when the original price is not positive.
pub fn discount_percentage(sale: f64, original: f64) -> Option<u8> {
    if !(original > 0.0) || !sale.is_finite() {
        return None;
    }
    let pct = ((original - sale) / original * 100.0).round();
    Some(pct.clamp(0.0, 100.0) as u8)
}

/// Coarse 0-100 score for adapter self-checks. The analyzer's scoring is the
/// one that decides what gets persisted.
pub fn baseline_score(listing: &RawListing) -> u8 {
    let discount = listing.discount_percentage.unwrap_or_else(|| {
        match (listing.sale_price, listing.original_price) {
            (Some(sale), Some(original)) => discount_percentage(sale, original).unwrap_or(0),
            _ => 0,
        }
    });
    let mut score = u32::from(discount).min(60);

    let price = listing.sale_price.unwrap_or(0.0);
    score += if price >= 100.0 {
        20
    } else if price >= 25.0 {
        10
    } else {
        0
    };

    if listing.in_stock {
        score += 15;
    } else if listing.limited_stock {
        score += 5;
    }
    if listing.image_url.is_some() {
        score += 5;
    }
    score.min(100) as u8
}

/// Title keywords adapters use for their coarse category guess.
const FALLBACK_CATEGORIES: &[(&str, &[&str])] = &[
    ("tech-electronics", &["laptop", "headphone", "tv", "monitor", "phone", "tablet", "camera", "speaker"]),
    ("home-garden", &["kitchen", "mixer", "vacuum", "furniture", "mattress", "garden", "cookware"]),
    ("fashion", &["shoe", "sneaker", "jacket", "dress", "shirt", "jeans", "watch"]),
    ("health-beauty", &["skincare", "shampoo", "makeup", "toothbrush", "vitamin"]),
    ("sports-outdoors", &["fitness", "bike", "camping", "yoga", "treadmill"]),
    ("kids-family", &["toy", "lego", "baby", "stroller"]),
    ("pets", &["dog", "cat", "pet"]),
];

/// Coarse category from title keywords (whole words, case-insensitive).
pub fn fallback_category(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    FALLBACK_CATEGORIES
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|k| {
                words
                    .iter()
                    .any(|w| *w == *k || w.strip_suffix('s') == Some(*k))
            })
        })
        .map(|(slug, _)| *slug)
}

/// A listing found just now, for adapters and tests that build listings by hand.
pub fn listing_now(retailer: &str, title: &str, url: &str, sale: f64, original: Option<f64>) -> RawListing {
    let mut listing = RawListing::new(retailer, title, url);
    listing.sale_price = Some(sale);
    listing.original_price = original;
    listing.discount_percentage = original.and_then(|o| discount_percentage(sale, o));
    listing.category_hint = fallback_category(title).map(str::to_string);
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formatted_prices() {
        assert_eq!(parse_price("$1,299.99"), Some(1299.99));
        assert_eq!(parse_price("Now $49.99"), Some(49.99));
        assert_eq!(parse_price("USD 15"), Some(15.0));
        assert_eq!(parse_price("$10.00 - $20.00"), Some(10.0));
        assert_eq!(parse_price("12."), Some(12.0));
    }

    #[test]
    fn unparseable_price_is_none() {
        assert_eq!(parse_price("See price in cart"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn discount_from_price_pair() {
        assert_eq!(discount_percentage(179.99, 399.99), Some(55));
        assert_eq!(discount_percentage(50.0, 100.0), Some(50));
        assert_eq!(discount_percentage(120.0, 100.0), Some(0));
        assert_eq!(discount_percentage(10.0, 0.0), None);
    }

    #[test]
    fn baseline_score_stays_in_range() {
        let mut listing = listing_now("Shop", "Big Screen TV 65 inch", "https://x/1", 10.0, Some(1000.0));
        listing.image_url = Some("https://x/i.jpg".to_string());
        assert!(baseline_score(&listing) <= 100);

        listing.sale_price = None;
        listing.discount_percentage = None;
        listing.in_stock = false;
        listing.image_url = None;
        assert_eq!(baseline_score(&listing), 0);
    }

    #[test]
    fn fallback_category_matches_whole_words() {
        assert_eq!(fallback_category("Sony Wireless Headphones"), Some("tech-electronics"));
        assert_eq!(fallback_category("KitchenAid Stand Mixer"), Some("home-garden"));
        assert_eq!(fallback_category("Catalog of things"), None);
    }
}
