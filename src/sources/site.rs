//! Selector-driven extraction shared by the live retailer adapters.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::fetch::{wait_for_listings, PageFetcher};
use super::{discount_percentage, fallback_category, parse_price};
use crate::config::ScrapeSettings;
use crate::error::{AppError, Result};
use crate::types::RawListing;

/// CSS selectors locating listing fields on one retailer's deal pages.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Deal-listing container that must be present before extraction starts.
    pub container: &'static str,
    /// One candidate item inside the container.
    pub item: &'static str,
    pub title: &'static str,
    pub price: &'static str,
    pub original_price: Option<&'static str>,
    pub image: &'static str,
    pub link: &'static str,
}

/// Lowercase text fragments that mark an item's availability.
#[derive(Debug, Clone)]
pub struct StockMarkers {
    pub out_of_stock: &'static [&'static str],
    pub limited: &'static [&'static str],
}

/// Everything that distinguishes one retailer from another.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub retailer: &'static str,
    pub base_url: &'static str,
    /// Deal pages relative to `base_url`, in visit order.
    pub deal_paths: &'static [&'static str],
    pub selectors: SiteSelectors,
    pub stock: StockMarkers,
    /// Items below this discount (percent) are dropped before the analyzer sees them.
    /// Zero passes everything through.
    pub min_discount: u8,
}

struct CompiledSelectors {
    container: Selector,
    item: Selector,
    title: Selector,
    price: Selector,
    original_price: Option<Selector>,
    image: Selector,
    link: Selector,
}

impl CompiledSelectors {
    fn compile(s: &SiteSelectors) -> Result<Self> {
        Ok(Self {
            container: parse_selector(s.container)?,
            item: parse_selector(s.item)?,
            title: parse_selector(s.title)?,
            price: parse_selector(s.price)?,
            original_price: s.original_price.map(parse_selector).transpose()?,
            image: parse_selector(s.image)?,
            link: parse_selector(s.link)?,
        })
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::Selector(format!("{css}: {e}")))
}

/// Why a single item on a page was not turned into a listing.
#[derive(Debug, PartialEq, Eq)]
pub enum ItemSkip {
    MissingTitle,
    MissingPrice,
    MissingLink,
    BelowDiscountGate(u8),
}

/// Per-page extraction tally, logged after each page.
#[derive(Debug, Default)]
pub struct PageStats {
    pub candidates: usize,
    pub extracted: usize,
    pub skipped_malformed: usize,
    pub skipped_gate: usize,
}

/// Fetches and extracts one retailer's deal pages.
pub struct SiteScraper {
    profile: SiteProfile,
    selectors: CompiledSelectors,
    fetcher: Arc<dyn PageFetcher>,
    settings: ScrapeSettings,
}

impl SiteScraper {
    pub fn new(profile: SiteProfile, fetcher: Arc<dyn PageFetcher>, settings: ScrapeSettings) -> Result<Self> {
        let selectors = CompiledSelectors::compile(&profile.selectors)?;
        Ok(Self {
            profile,
            selectors,
            fetcher,
            settings,
        })
    }

    pub fn retailer(&self) -> &str {
        self.profile.retailer
    }

    pub fn base_url(&self) -> &str {
        self.profile.base_url
    }

    pub fn deal_urls(&self) -> Vec<String> {
        let base = self.profile.base_url.trim_end_matches('/');
        self.profile
            .deal_paths
            .iter()
            .map(|path| format!("{base}/{}", path.trim_start_matches('/')))
            .collect()
    }

    /// Visit every deal page in order. A page that fails to load or never
    /// shows its listing container is logged and skipped; only when no page
    /// could be reached at all is the adapter reported as failed.
    pub async fn scrape(&self) -> Result<Vec<RawListing>> {
        let urls = self.deal_urls();
        let mut listings = Vec::new();
        let mut unreachable = 0usize;

        for url in &urls {
            let body = match wait_for_listings(
                self.fetcher.as_ref(),
                url,
                &self.selectors.container,
                self.profile.selectors.container,
                &self.settings,
            )
            .await
            {
                Ok(body) => body,
                Err(e) => {
                    if matches!(e, AppError::Navigation { .. } | AppError::Http(_)) {
                        unreachable += 1;
                    }
                    warn!(retailer = self.profile.retailer, url = %url, "Skipping page: {e}");
                    continue;
                }
            };

            let (page_listings, stats) = self.extract_page(&body, url);
            info!(
                retailer = self.profile.retailer,
                url = %url,
                candidates = stats.candidates,
                extracted = stats.extracted,
                malformed = stats.skipped_malformed,
                below_gate = stats.skipped_gate,
                "Extracted {} listings from {url}",
                stats.extracted,
            );
            listings.extend(page_listings);
        }

        if !urls.is_empty() && unreachable == urls.len() {
            return Err(AppError::SourceUnavailable {
                retailer: self.profile.retailer.to_string(),
                pages: urls.len(),
            });
        }
        Ok(listings)
    }

    /// Extract up to `max_items_per_page` listings from one loaded page.
    pub fn extract_page(&self, html: &str, page_url: &str) -> (Vec<RawListing>, PageStats) {
        let document = Html::parse_document(html);
        let mut stats = PageStats::default();
        let mut listings = Vec::new();

        for item in document
            .select(&self.selectors.item)
            .take(self.settings.max_items_per_page)
        {
            stats.candidates += 1;
            match self.extract_item(item, page_url) {
                Ok(listing) => {
                    stats.extracted += 1;
                    listings.push(listing);
                }
                Err(ItemSkip::BelowDiscountGate(pct)) => {
                    stats.skipped_gate += 1;
                    debug!(retailer = self.profile.retailer, discount = pct, "Item below adapter discount gate");
                }
                Err(reason) => {
                    stats.skipped_malformed += 1;
                    warn!(retailer = self.profile.retailer, page = page_url, ?reason, "Skipping malformed item");
                }
            }
        }

        (listings, stats)
    }

    fn extract_item(&self, item: ElementRef<'_>, page_url: &str) -> std::result::Result<RawListing, ItemSkip> {
        let s = &self.selectors;

        let title = first_text(item, &s.title).ok_or(ItemSkip::MissingTitle)?;
        let sale_price = first_text(item, &s.price)
            .and_then(|t| parse_price(&t))
            .ok_or(ItemSkip::MissingPrice)?;
        let href = item
            .select(&s.link)
            .find_map(|a| a.value().attr("href"))
            .ok_or(ItemSkip::MissingLink)?;
        let deal_url = resolve_url(page_url, href).ok_or(ItemSkip::MissingLink)?;

        let original_price = s
            .original_price
            .as_ref()
            .and_then(|sel| first_text(item, sel))
            .and_then(|t| parse_price(&t))
            .filter(|original| *original > sale_price);
        let discount = original_price.and_then(|o| discount_percentage(sale_price, o));

        if self.profile.min_discount > 0 {
            let pct = discount.unwrap_or(0);
            if pct < self.profile.min_discount {
                return Err(ItemSkip::BelowDiscountGate(pct));
            }
        }

        let image_url = item
            .select(&s.image)
            .find_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| resolve_url(page_url, src));

        let item_text = collapse_whitespace(&item.text().collect::<Vec<_>>().join(" ")).to_lowercase();
        let out_of_stock = self.profile.stock.out_of_stock.iter().any(|m| item_text.contains(m));
        let limited_stock = self.profile.stock.limited.iter().any(|m| item_text.contains(m))
            || mentions_few_left(&item_text);

        let mut listing = RawListing::new(self.profile.retailer, title, deal_url);
        listing.sale_price = Some(sale_price);
        listing.original_price = original_price;
        listing.discount_percentage = discount;
        listing.image_url = image_url;
        listing.in_stock = !out_of_stock;
        listing.limited_stock = limited_stock;
        listing.category_hint = fallback_category(&listing.title).map(str::to_string);
        Ok(listing)
    }
}

fn first_text(item: ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector)
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .find(|t| !t.is_empty())
}

/// "only 3 left" style counters in lowercase item text.
fn mentions_few_left(text: &str) -> bool {
    text.match_indices("only ").any(|(i, m)| {
        let rest = &text[i + m.len()..];
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        digits > 0 && rest[digits..].trim_start().starts_with("left")
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve_url(page_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let resolved = base.join(href.trim()).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
