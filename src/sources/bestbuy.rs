use std::sync::Arc;

use async_trait::async_trait;

use super::site::{SiteProfile, SiteScraper, SiteSelectors, StockMarkers};
use super::{PageFetcher, SourceAdapter};
use crate::config::ScrapeSettings;
use crate::error::Result;
use crate::types::RawListing;

/// Best Buy's deal-of-the-day and top-deals pages. Its "Was" prices are
/// reliable, so only items under 10% off are dropped here.
pub const PROFILE: SiteProfile = SiteProfile {
    retailer: "Best Buy",
    base_url: "https://www.bestbuy.com",
    deal_paths: &["/site/misc/deal-of-the-day/pcmcat248000050016.c", "/site/electronics/top-deals/pcmcat1563299784494.c"],
    selectors: SiteSelectors {
        container: ".sku-item-list, .deals-list",
        item: "li.sku-item, .offer-item",
        title: "h4.sku-title a, .sku-header a, .offer-title",
        price: ".priceView-customer-price span[aria-hidden='true'], .priceView-customer-price span",
        original_price: Some(".pricing-price__regular-price, .priceView-was-price"),
        image: "img.product-image",
        link: "h4.sku-title a, .sku-header a, a.offer-link",
    },
    stock: StockMarkers {
        out_of_stock: &["sold out", "coming soon", "unavailable nearby"],
        limited: &["only a few left", "limited quantities"],
    },
    min_discount: 10,
};

pub struct BestBuyAdapter {
    site: SiteScraper,
}

impl BestBuyAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: ScrapeSettings) -> Result<Self> {
        Ok(Self {
            site: SiteScraper::new(PROFILE, fetcher, settings)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for BestBuyAdapter {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fetch::testing::{fast_settings, FixtureFetcher};

    const DEAL_OF_THE_DAY: &str = r#"
        <ol class="sku-item-list">
          <li class="sku-item">
            <img class="product-image" src="https://pisces.bbystatic.com/image2/6505727.jpg">
            <h4 class="sku-title"><a href="/site/lg-65-class-c3-oled/6535917.p">LG 65" Class C3 Series OLED 4K UHD Smart TV</a></h4>
            <div class="priceView-customer-price"><span aria-hidden="true">$1,499.99</span></div>
            <div class="pricing-price__regular-price">Was $2,699.99</div>
            <button>Sold Out</button>
          </li>
        </ol>"#;

    #[tokio::test]
    async fn parses_thousands_separators_and_sold_out() {
        let fetcher = FixtureFetcher::default().with_page(
            "https://www.bestbuy.com/site/misc/deal-of-the-day/pcmcat248000050016.c",
            DEAL_OF_THE_DAY,
        );
        let adapter = BestBuyAdapter::new(Arc::new(fetcher), fast_settings()).unwrap();
        let listings = adapter.scrape_deals().await.unwrap();

        assert_eq!(listings.len(), 1);
        let tv = &listings[0];
        assert_eq!(tv.sale_price, Some(1499.99));
        assert_eq!(tv.original_price, Some(2699.99));
        assert_eq!(tv.discount_percentage, Some(44));
        assert!(!tv.in_stock);
        assert_eq!(tv.deal_url, "https://www.bestbuy.com/site/lg-65-class-c3-oled/6535917.p");
        assert_eq!(tv.retailer_name, "Best Buy");
    }
}
