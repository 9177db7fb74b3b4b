use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Response};
use url::Url;

use crate::config::SiteConfig;
use crate::error::{AppError, Result};
use crate::models::Candidate;

use super::{feed, page, CandidateSource, MAX_CANDIDATES};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Plain HTTP source: RSS/Atom feeds or scraped front pages.
pub struct WebSource {
    client: Client,
}

impl WebSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("da,en;q=0.8"));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Source(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl CandidateSource for WebSource {
    async fn fetch_candidates(&self, site: &SiteConfig) -> Result<Vec<Candidate>> {
        let response = self.get(&site.url).await?;
        let page_url: Url = response.url().clone();
        let bytes = response.bytes().await?;

        // Feeds first, front-page scraping otherwise.
        if let Ok(candidates) = feed::candidates_from_feed(&bytes[..], MAX_CANDIDATES) {
            tracing::debug!(site = %site.name, count = candidates.len(), "Parsed feed");
            return Ok(candidates);
        }

        let html = String::from_utf8_lossy(&bytes);
        let candidates = page::extract_headlines(&html, &page_url, MAX_CANDIDATES);
        tracing::debug!(site = %site.name, count = candidates.len(), "Scraped headlines");
        Ok(candidates)
    }

    async fn fetch_full_text(&self, url: &str) -> Result<String> {
        let html = self.get(url).await?.text().await?;
        Ok(page::extract_article_text(&html))
    }
}
