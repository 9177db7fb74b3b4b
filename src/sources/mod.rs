mod feed;
mod page;
mod web;

use async_trait::async_trait;

use crate::config::SiteConfig;
use crate::error::Result;
use crate::models::Candidate;

pub use web::WebSource;

/// Candidates beyond this are dropped before skimming.
pub const MAX_CANDIDATES: usize = 60;

/// Where headlines and article bodies come from.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Headlines currently published by `site`, at most [`MAX_CANDIDATES`].
    async fn fetch_candidates(&self, site: &SiteConfig) -> Result<Vec<Candidate>>;

    /// Readable body text of a single article.
    async fn fetch_full_text(&self, url: &str) -> Result<String>;
}
