use std::sync::Arc;

use async_trait::async_trait;

use super::site::{SiteProfile, SiteScraper, SiteSelectors, StockMarkers};
use super::{PageFetcher, SourceAdapter};
use crate::config::ScrapeSettings;
use crate::error::Result;
use crate::types::RawListing;

/// Walmart rollback and flash-deal shelves. Many rollbacks omit the list
/// price, so nothing is filtered here and the analyzer decides.
pub const PROFILE: SiteProfile = SiteProfile {
    retailer: "Walmart",
    base_url: "https://www.walmart.com",
    deal_paths: &["/shop/deals", "/shop/deals/flash-deals"],
    selectors: SiteSelectors {
        container: "[data-testid='item-stack'], [data-stack-index]",
        item: "[data-item-id], [data-testid='list-view']",
        title: "[data-automation-id='product-title'], span.w_iUH7",
        price: "[data-automation-id='product-price'] .f2, [itemprop='price'], [data-automation-id='product-price'] span",
        original_price: Some(".strike, [data-automation-id='strikethrough-price']"),
        image: "img[data-testid='productTileImage'], img",
        link: "a[link-identifier], a[href*='/ip/']",
    },
    stock: StockMarkers {
        out_of_stock: &["out of stock", "get in-stock alert"],
        limited: &["low stock", "left in stock"],
    },
    min_discount: 0,
};

pub struct WalmartAdapter {
    site: SiteScraper,
}

impl WalmartAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: ScrapeSettings) -> Result<Self> {
        Ok(Self {
            site: SiteScraper::new(PROFILE, fetcher, settings)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for WalmartAdapter {
    fn retailer_name(&self) -> &str {
        self.site.retailer()
    }

    fn base_url(&self) -> &str {
        self.site.base_url()
    }

    fn deal_urls(&self) -> Vec<String> {
        self.site.deal_urls()
    }

    async fn scrape_deals(&self) -> Result<Vec<RawListing>> {
        self.site.scrape().await
    }
}
