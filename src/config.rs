use std::time::Duration;

use crate::error::{AppError, Result};

/// Default ordered adapter registration list.
pub const DEFAULT_SOURCES: &str = "amazon,bestbuy,walmart";

/// Per-page navigation timeout (seconds).
pub const NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Bounded wait for a page's deal-listing container (seconds).
pub const ELEMENT_WAIT_SECS: u64 = 10;

/// Delay between container presence checks while waiting (milliseconds).
pub const ELEMENT_POLL_MS: u64 = 1_000;

/// Cap on candidate items extracted from a single page.
pub const MAX_ITEMS_PER_PAGE: usize = 20;

/// Interval between scheduled discovery runs (seconds).
pub const DISCOVERY_INTERVAL_SECS: u64 = 3_600;

/// Browser-like user agent sent with every page fetch.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Analyzer defaults.
pub mod analyzer_defaults {
    pub const MIN_PRICE: f64 = 5.0;
    pub const MAX_PRICE: f64 = 10_000.0;
    pub const MIN_DISCOUNT: u8 = 20;
    pub const MIN_TITLE_CHARS: usize = 10;
    pub const MAX_TITLE_CHARS: usize = 300;
    /// Leading title characters compared against stored deal names.
    pub const DUPLICATE_PREFIX_CHARS: usize = 50;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between scheduled runs; 0 disables the scheduler (DISCOVERY_INTERVAL_SECS)
    pub discovery_interval_secs: u64,
    /// Run one discovery pass immediately at startup (DISCOVERY_ON_STARTUP)
    pub discovery_on_startup: bool,
    /// Adapter names in registration order (DISCOVERY_SOURCES, comma-separated).
    /// Example: "amazon,bestbuy,walmart,fixture"
    pub sources: Vec<String>,
    pub scrape: ScrapeSettings,
    /// Analyzer price window (DEAL_MIN_PRICE / DEAL_MAX_PRICE)
    pub min_price: f64,
    pub max_price: f64,
    /// Analyzer discount floor in percent (DEAL_MIN_DISCOUNT)
    pub min_discount: u8,
}

/// Page-visit bounds shared by every live adapter.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub navigation_timeout: Duration,
    pub element_wait: Duration,
    pub element_poll: Duration,
    pub max_items_per_page: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(NAVIGATION_TIMEOUT_SECS),
            element_wait: Duration::from_secs(ELEMENT_WAIT_SECS),
            element_poll: Duration::from_millis(ELEMENT_POLL_MS),
            max_items_per_page: MAX_ITEMS_PER_PAGE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        use analyzer_defaults::*;

        let min_price = std::env::var("DEAL_MIN_PRICE")
            .unwrap_or_else(|_| MIN_PRICE.to_string())
            .parse::<f64>()
            .unwrap_or(MIN_PRICE);
        let max_price = std::env::var("DEAL_MAX_PRICE")
            .unwrap_or_else(|_| MAX_PRICE.to_string())
            .parse::<f64>()
            .unwrap_or(MAX_PRICE);
        if min_price > max_price {
            return Err(AppError::Config(format!(
                "DEAL_MIN_PRICE ({min_price}) exceeds DEAL_MAX_PRICE ({max_price})"
            )));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "deals.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            discovery_interval_secs: std::env::var("DISCOVERY_INTERVAL_SECS")
                .unwrap_or_else(|_| DISCOVERY_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(DISCOVERY_INTERVAL_SECS),
            discovery_on_startup: std::env::var("DISCOVERY_ON_STARTUP")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            sources: parse_list(
                &std::env::var("DISCOVERY_SOURCES").unwrap_or_else(|_| DEFAULT_SOURCES.to_string()),
            ),
            scrape: ScrapeSettings {
                navigation_timeout: Duration::from_secs(
                    std::env::var("NAVIGATION_TIMEOUT_SECS")
                        .unwrap_or_else(|_| NAVIGATION_TIMEOUT_SECS.to_string())
                        .parse::<u64>()
                        .unwrap_or(NAVIGATION_TIMEOUT_SECS),
                ),
                element_wait: Duration::from_secs(
                    std::env::var("ELEMENT_WAIT_SECS")
                        .unwrap_or_else(|_| ELEMENT_WAIT_SECS.to_string())
                        .parse::<u64>()
                        .unwrap_or(ELEMENT_WAIT_SECS),
                ),
                element_poll: Duration::from_millis(ELEMENT_POLL_MS),
                max_items_per_page: std::env::var("MAX_ITEMS_PER_PAGE")
                    .unwrap_or_else(|_| MAX_ITEMS_PER_PAGE.to_string())
                    .parse::<usize>()
                    .unwrap_or(MAX_ITEMS_PER_PAGE),
            },
            min_price,
            max_price,
            min_discount: std::env::var("DEAL_MIN_DISCOUNT")
                .unwrap_or_else(|_| MIN_DISCOUNT.to_string())
                .parse::<u8>()
                .map(|d| d.min(100))
                .unwrap_or(MIN_DISCOUNT),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
