use std::sync::Arc;

use async_trait::async_trait;

use super::site::{SiteProfile, SiteScraper, SiteSelectors, StockMarkers};
use super::{PageFetcher, SourceAdapter};
use crate::config::ScrapeSettings;
use crate::error::Result;
use crate::types::RawListing;

/// Amazon's Today's Deals grid. Amazon shows the list price next to most
/// deals, so items under 15% off are dropped here.
pub const PROFILE: SiteProfile = SiteProfile {
    retailer: "Amazon",
    base_url: "https://www.amazon.com",
    deal_paths: &["/gp/goldbox", "/deals?bubble-id=deals-collection-lightning-deals"],
    selectors: SiteSelectors {
        container: "[data-testid='grid-deals-container'], #dealsGridLinkAnchor",
        item: "[data-testid='deal-card'], .DealGridItem-module__dealItem",
        title: "[class*='DealContent-module__truncate'], .a-truncate-full, .dealTitle",
        price: ".a-price:not(.a-text-price) .a-offscreen, .dealPriceText",
        original_price: Some(".a-text-price .a-offscreen, .a-text-strike"),
        image: "img",
        link: "a[data-testid='deal-card-link'], a.a-link-normal",
    },
    stock: StockMarkers {
        out_of_stock: &["currently unavailable", "deal is sold out", "100% claimed"],
        limited: &["left in stock", "% claimed", "limited time deal"],
    },
    min_discount: 15,
};

pub struct AmazonAdapter {
    site: SiteScraper,
}

impl AmazonAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: ScrapeSettings) -> Result<Self> {
        Ok(Self {
            site: SiteScraper::new(PROFILE, fetcher, settings)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for AmazonAdapter {
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
