//! In-memory fakes for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::ai::{Capabilities, CompletionRequest, ScoringBackend};
use crate::config::SiteConfig;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::models::{Article, Candidate, DisciplineScore, PrimaryDiscipline, ScoredArticleRow, ScoringResult};
use crate::sources::CandidateSource;

pub fn site(name: &str) -> SiteConfig {
    SiteConfig {
        name: name.to_string(),
        url: format!("https://{}.example/", name.to_lowercase()),
        language: "da".to_string(),
        paywall: false,
    }
}

pub fn candidate(url: &str) -> Candidate {
    Candidate {
        title: format!("Overskrift for {url}"),
        teaser: "Kort teaser".to_string(),
        url: url.to_string(),
        published: None,
    }
}

pub fn long_text() -> String {
    "Regeringen og arbejdsmarkedets parter er enige om en ny aftale. ".repeat(5)
}

/// Source serving fixed candidates per site name and fixed article bodies per URL.
#[derive(Default)]
pub struct FakeSource {
    pub candidates: HashMap<String, Result<Vec<Candidate>>>,
    pub texts: HashMap<String, String>,
    pub text_requests: Mutex<Vec<String>>,
    /// Cancelled as soon as any article body is requested.
    pub cancel_on_read: Option<CancellationToken>,
}

impl FakeSource {
    pub fn with_site(mut self, name: &str, urls: &[&str]) -> Self {
        let candidates = urls.iter().map(|u| candidate(u)).collect();
        self.candidates.insert(name.to_string(), Ok(candidates));
        for url in urls {
            self.texts.entry(url.to_string()).or_insert_with(long_text);
        }
        self
    }

    pub fn with_failing_site(mut self, name: &str) -> Self {
        self.candidates
            .insert(name.to_string(), Err(AppError::Source("HTTP 503".to_string())));
        self
    }

    pub fn with_text(mut self, url: &str, text: &str) -> Self {
        self.texts.insert(url.to_string(), text.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.text_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateSource for FakeSource {
    async fn fetch_candidates(&self, site: &SiteConfig) -> Result<Vec<Candidate>> {
        match self.candidates.get(&site.name) {
            Some(Ok(candidates)) => Ok(candidates.clone()),
            Some(Err(e)) => Err(AppError::Source(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_full_text(&self, url: &str) -> Result<String> {
        self.text_requests.lock().unwrap().push(url.to_string());
        if let Some(token) = &self.cancel_on_read {
            token.cancel();
        }
        self.texts
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Source(format!("HTTP 404 from {url}")))
    }
}

#[derive(Debug, Clone)]
pub enum SkimBehavior {
    /// Not skim-capable.
    Unsupported,
    Keep(Vec<usize>),
    Fail,
}

/// Backend with scripted skim output and per-URL scores. URLs without a
/// score yield `None`, like a malformed model response.
pub struct FakeBackend {
    pub skim: SkimBehavior,
    pub scores: HashMap<String, u8>,
    pub skim_calls: Mutex<usize>,
    pub scored: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(skim: SkimBehavior) -> Self {
        Self {
            skim,
            scores: HashMap::new(),
            skim_calls: Mutex::new(0),
            scored: Mutex::new(Vec::new()),
        }
    }

    pub fn scoring(mut self, url: &str, score: u8) -> Self {
        self.scores.insert(url.to_string(), score);
        self
    }

    pub fn scored_urls(&self) -> Vec<String> {
        self.scored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoringBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            skim: !matches!(self.skim, SkimBehavior::Unsupported),
            preflight: false,
        }
    }

    async fn complete(&self, _request: &CompletionRequest<'_>) -> Result<String> {
        Err(AppError::BackendUnavailable("fake"))
    }

    async fn skim(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
        *self.skim_calls.lock().unwrap() += 1;
        match &self.skim {
            SkimBehavior::Unsupported => Ok((0..candidates.len()).collect()),
            SkimBehavior::Keep(indices) => Ok(indices.clone()),
            SkimBehavior::Fail => Err(AppError::MalformedResponse("not json".to_string())),
        }
    }

    async fn score_article(&self, article: &Article) -> Option<ScoringResult> {
        self.scored.lock().unwrap().push(article.url.clone());
        let score = *self.scores.get(&article.url)?;
        Some(ScoringResult {
            article_url: article.url.clone(),
            overall_score: score,
            disciplines: DisciplineScore::default(),
            primary_discipline: PrimaryDiscipline::from("politik"),
            explanation: "test".to_string(),
            backend_used: self.name().to_string(),
            scored_at: Utc::now(),
        })
    }
}

/// Store that records every write in order and enforces article-before-score.
#[derive(Default)]
pub struct MemoryStore {
    pub articles: Mutex<HashMap<String, Article>>,
    pub scores: Mutex<HashMap<String, ScoringResult>>,
    pub writes: Mutex<Vec<String>>,
    pub failing_lookups: HashSet<String>,
    pub fail_article_writes: bool,
}

impl MemoryStore {
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn score_count(&self) -> usize {
        self.scores.lock().unwrap().len()
    }

    pub fn article_count(&self) -> usize {
        self.articles.lock().unwrap().len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn has_score(&self, url: &str) -> Result<bool> {
        if self.failing_lookups.contains(url) {
            return Err(AppError::Config("database is locked".to_string()));
        }
        Ok(self.scores.lock().unwrap().contains_key(url))
    }

    async fn save_article(&self, article: &Article) -> Result<()> {
        if self.fail_article_writes {
            return Err(AppError::Config("disk full".to_string()));
        }
        self.writes.lock().unwrap().push(format!("article:{}", article.url));
        self.articles
            .lock()
            .unwrap()
            .insert(article.url.clone(), article.clone());
        Ok(())
    }

    async fn save_score(&self, result: &ScoringResult) -> Result<()> {
        if !self.articles.lock().unwrap().contains_key(&result.article_url) {
            return Err(AppError::Config(format!("orphan score for {}", result.article_url)));
        }
        self.writes.lock().unwrap().push(format!("score:{}", result.article_url));
        self.scores
            .lock()
            .unwrap()
            .insert(result.article_url.clone(), result.clone());
        Ok(())
    }

    async fn scored_articles(&self, _min_score: u8, _limit: usize) -> Result<Vec<ScoredArticleRow>> {
        Ok(Vec::new())
    }

    async fn todays_scored_articles(&self, _min_score: u8) -> Result<Vec<ScoredArticleRow>> {
        Ok(Vec::new())
    }
}
