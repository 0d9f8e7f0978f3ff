use async_trait::async_trait;

use super::{listing_now, SourceAdapter};
use crate::error::Result;
use crate::types::RawListing;

const RETAILER: &str = "Test Retailer";
const BASE_URL: &str = "https://deals.test";

/// Deterministic adapter returning a hand-built set of listings.
/// Performs no I/O; used to exercise the analyzer and orchestrator offline.
#[derive(Debug, Default)]
pub struct FixtureAdapter;

impl FixtureAdapter {
    pub fn new() -> Self {
        Self
    }

    fn listings() -> Vec<RawListing> {
        let url = |slug: &str| format!("{BASE_URL}/fixture/{slug}");

        let headphones = listing_now(RETAILER, "Test Sony Headphones", &url("sony-headphones"), 179.99, Some(399.99));

        let mut mixer = listing_now(
            RETAILER,
            "KitchenAid Stand Mixer 5-Quart Artisan Series Tilt-Head, Empire Red",
            &url("kitchenaid-mixer"),
            249.99,
            Some(459.99),
        );
        mixer.description = Some("10-speed stand mixer with bowl for baking and cooking".to_string());

        let spam = listing_now(RETAILER, "bitcoin investment opportunity deal", &url("btc"), 49.99, Some(199.99));

        let socks = listing_now(RETAILER, "Basic Cotton Crew Socks 6-Pack", &url("socks"), 18.0, Some(20.0));

        let shoes = listing_now(RETAILER, "Nike Air Zoom Pegasus Running Shoes", &url("pegasus"), 84.97, Some(130.0));

        let mut cooker = listing_now(
            RETAILER,
            "Instant Pot Duo 7-in-1 Electric Pressure Cooker",
            &url("instant-pot"),
            59.99,
            Some(99.99),
        );
        cooker.in_stock = false;
        cooker.limited_stock = true;

        vec![headphones, mixer, spam, socks, shoes, cooker]
    }
}

#[async_trait]
impl SourceAdapter for FixtureAdapter {
    fn retailer_name(&self) -> &str {
        RETAILER
    }

    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn deal_urls(&self) -> Vec<String> {
        vec![format!("{BASE_URL}/fixture")]
    }

    async fn scrape_deals(&self) -> Result<Vec<RawListing>> {
        Ok(Self::listings())
    }
}
