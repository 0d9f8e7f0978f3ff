use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::{ScrapeSettings, USER_AGENT};
use crate::error::{AppError, Result};

/// Page-load capability the adapters are built on.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url` and return the document body. Fails with
    /// `AppError::Navigation` on network errors, non-2xx responses or timeout.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// reqwest-backed fetcher for static retailer pages.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    latency: Arc<LatencyStats>,
}

impl HttpPageFetcher {
    pub fn new(latency: Arc<LatencyStats>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, latency })
    }

    async fn load(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String> {
        let started = Instant::now();
        let body = match tokio::time::timeout(timeout, self.load(url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(AppError::Http(e))) => {
                return Err(AppError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(AppError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {}s", timeout.as_secs()),
                })
            }
        };

        self.latency.record(started.elapsed());
        debug!(url, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Fetched page");
        Ok(body)
    }
}

/// Load `url` until `container` is present in the document or the element
/// wait runs out. Navigation failures are returned immediately; a page that
/// loads but never shows the container yields `AppError::ElementTimeout`.
pub async fn wait_for_listings(
    fetcher: &dyn PageFetcher,
    url: &str,
    container: &Selector,
    container_css: &str,
    settings: &ScrapeSettings,
) -> Result<String> {
    let deadline = Instant::now() + settings.element_wait;
    loop {
        let body = fetcher.fetch(url, settings.navigation_timeout).await?;
        if has_match(&body, container) {
            return Ok(body);
        }
        if Instant::now() + settings.element_poll >= deadline {
            return Err(AppError::ElementTimeout {
                url: url.to_string(),
                selector: container_css.to_string(),
            });
        }
        tokio::time::sleep(settings.element_poll).await;
    }
}

fn has_match(body: &str, selector: &Selector) -> bool {
    Html::parse_document(body).select(selector).next().is_some()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves canned HTML by URL; unknown URLs fail as unreachable.
    #[derive(Default)]
    pub struct FixtureFetcher {
        pages: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl FixtureFetcher {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| AppError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    pub fn fast_settings() -> ScrapeSettings {
        ScrapeSettings {
            navigation_timeout: Duration::from_millis(200),
            element_wait: Duration::from_millis(30),
            element_poll: Duration::from_millis(10),
            max_items_per_page: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{fast_settings, FixtureFetcher};
    use super::*;

    #[tokio::test]
    async fn returns_body_once_container_present() {
        let fetcher = FixtureFetcher::default()
            .with_page("https://shop.test/deals", "<div id='grid'><p>x</p></div>");
        let sel = Selector::parse("#grid").unwrap();
        let body = wait_for_listings(&fetcher, "https://shop.test/deals", &sel, "#grid", &fast_settings())
            .await
            .unwrap();
        assert!(body.contains("grid"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_container_times_out_after_polling() {
        let fetcher = FixtureFetcher::default()
            .with_page("https://shop.test/deals", "<div id='other'></div>");
        let sel = Selector::parse("#grid").unwrap();
        let err = wait_for_listings(&fetcher, "https://shop.test/deals", &sel, "#grid", &fast_settings())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ElementTimeout { .. }));
        assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn navigation_failure_is_not_retried() {
        let fetcher = FixtureFetcher::default();
        let sel = Selector::parse("#grid").unwrap();
        let err = wait_for_listings(&fetcher, "https://down.test/", &sel, "#grid", &fast_settings())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Navigation { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
