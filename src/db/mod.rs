mod repository;
mod schema;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Article, ScoredArticleRow, ScoringResult};

pub use repository::Repository;

/// Persistence contract of the curation pipeline, keyed by article URL.
///
/// `save_article` must be called before `save_score` for the same URL; a
/// score is never stored for an article that does not exist.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn has_score(&self, url: &str) -> Result<bool>;

    /// Insert or replace the article with this URL.
    async fn save_article(&self, article: &Article) -> Result<()>;

    /// Insert or replace the score for `result.article_url`.
    async fn save_score(&self, result: &ScoringResult) -> Result<()>;

    /// Scored articles at or above `min_score`, best first, then newest first.
    async fn scored_articles(&self, min_score: u8, limit: usize) -> Result<Vec<ScoredArticleRow>>;

    /// Like `scored_articles`, restricted to scores recorded since local midnight.
    async fn todays_scored_articles(&self, min_score: u8) -> Result<Vec<ScoredArticleRow>>;
}
