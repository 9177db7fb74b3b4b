//! Curation pipeline: fetch, skim, dedupe, deep-read, score, store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai::ScoringBackend;
use crate::config::{Config, SiteConfig};
use crate::db::ArticleStore;
use crate::models::{Article, Candidate, MIN_FULL_TEXT_CHARS};
use crate::sources::{CandidateSource, MAX_CANDIDATES};

/// Inclusive bounds of a random pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    #[cfg(test)]
    pub const NONE: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn from_secs((min, max): (f64, f64)) -> Self {
        Self {
            min: Duration::try_from_secs_f64(min).unwrap_or_default(),
            max: Duration::try_from_secs_f64(max).unwrap_or_default(),
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max.is_zero() || self.max <= self.min {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

#[derive(Debug, Clone)]
pub struct CuratorConfig {
    /// Scores below this are discarded without writes.
    pub min_score: u8,
    pub article_delay: DelayRange,
    pub source_delay: DelayRange,
    pub startup_jitter: Duration,
    pub skip_jitter: bool,
}

impl CuratorConfig {
    pub fn from_config(config: &Config, skip_jitter: bool) -> Self {
        Self {
            min_score: config.scoring.min_score,
            article_delay: DelayRange::from_secs(config.pacing.article_delay_secs),
            source_delay: DelayRange::from_secs(config.pacing.source_delay_secs),
            startup_jitter: Duration::from_secs(u64::from(config.pacing.startup_jitter_minutes) * 60),
            skip_jitter,
        }
    }
}

/// Per-site counters of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSummary {
    pub site: String,
    pub headlines: usize,
    pub skimmed_in: usize,
    pub already_seen: usize,
    pub lookup_failed: usize,
    /// Skimmed-in headlines not scored before.
    pub candidates: usize,
    pub extraction_failed: usize,
    /// Article bodies fetched.
    pub deep_read: usize,
    pub too_short: usize,
    /// Backend returned a result.
    pub scored: usize,
    pub score_failed: usize,
    pub below_threshold: usize,
    pub saved: usize,
    pub write_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceSummary {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for SourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} headlines, {} candidates, {} saved",
            self.site, self.headlines, self.candidates, self.saved
        )?;
        if let Some(error) = &self.error {
            write!(f, " (error: {error})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub backend: String,
    pub cancelled: bool,
    pub sources: Vec<SourceSummary>,
}

impl RunSummary {
    pub(crate) fn new(backend: &str) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            backend: backend.to_string(),
            cancelled: false,
            sources: Vec::new(),
        }
    }

    pub fn total_saved(&self) -> usize {
        self.sources.iter().map(|s| s.saved).sum()
    }

    pub fn total_headlines(&self) -> usize {
        self.sources.iter().map(|s| s.headlines).sum()
    }

    fn finish(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self.finished_at = Utc::now();
        self
    }
}

pub struct Curator {
    backend: Arc<dyn ScoringBackend>,
    source: Arc<dyn CandidateSource>,
    store: Arc<dyn ArticleStore>,
    config: CuratorConfig,
}

impl Curator {
    pub fn new(
        backend: Arc<dyn ScoringBackend>,
        source: Arc<dyn CandidateSource>,
        store: Arc<dyn ArticleStore>,
        config: CuratorConfig,
    ) -> Self {
        Self {
            backend,
            source,
            store,
            config,
        }
    }

    /// Process every site in order. Never fails: per-site and per-article
    /// problems are logged and counted in the returned summary.
    pub async fn run(&self, sites: &[SiteConfig], cancel: &CancellationToken) -> RunSummary {
        let mut summary = RunSummary::new(self.backend.name());

        if !self.config.skip_jitter && !self.config.startup_jitter.is_zero() {
            let jitter = DelayRange {
                min: Duration::ZERO,
                max: self.config.startup_jitter,
            }
            .sample();
            info!(seconds = jitter.as_secs(), "Waiting before run");
            if !pause(jitter, cancel).await {
                return summary.finish(true);
            }
        }

        info!(backend = self.backend.name(), sites = sites.len(), "Curation run started");

        for (i, site) in sites.iter().enumerate() {
            if i > 0 && !pause(self.config.source_delay.sample(), cancel).await {
                return summary.finish(true);
            }
            if cancel.is_cancelled() {
                return summary.finish(true);
            }

            let site_summary = self.curate_site(site, cancel).await;
            info!("{site_summary}");
            summary.sources.push(site_summary);
        }

        let cancelled = cancel.is_cancelled();
        let summary = summary.finish(cancelled);
        info!(
            saved = summary.total_saved(),
            headlines = summary.total_headlines(),
            cancelled,
            "Curation run finished"
        );
        summary
    }

    async fn curate_site(&self, site: &SiteConfig, cancel: &CancellationToken) -> SourceSummary {
        let mut summary = SourceSummary::new(&site.name);

        let mut candidates = match self.source.fetch_candidates(site).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(site = %site.name, error = %e, "Failed to fetch headlines");
                summary.error = Some(e.to_string());
                return summary;
            }
        };
        candidates.truncate(MAX_CANDIDATES);
        summary.headlines = candidates.len();

        if candidates.is_empty() {
            debug!(site = %site.name, "No headlines found");
            return summary;
        }

        let shortlist = self.skim(site, &candidates).await;
        summary.skimmed_in = shortlist.len();

        let mut first = true;
        for candidate in shortlist {
            if cancel.is_cancelled() {
                break;
            }

            match self.store.has_score(&candidate.url).await {
                Ok(true) => {
                    summary.already_seen += 1;
                    continue;
                }
                Ok(false) => summary.candidates += 1,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Score lookup failed; skipping");
                    summary.lookup_failed += 1;
                    continue;
                }
            }

            if !first && !pause(self.config.article_delay.sample(), cancel).await {
                break;
            }
            first = false;

            self.deep_read(site, candidate, &mut summary).await;
        }

        summary
    }

    /// Candidates the backend considers worth reading. Falls back to all of
    /// them when skimming fails.
    async fn skim<'c>(&self, site: &SiteConfig, candidates: &'c [Candidate]) -> Vec<&'c Candidate> {
        let indices = match self.backend.skim(candidates).await {
            Ok(indices) => indices,
            Err(e) => {
                warn!(site = %site.name, error = %e, "Skim failed; reading every headline");
                (0..candidates.len()).collect()
            }
        };

        let shortlist: Vec<&Candidate> = indices.iter().filter_map(|&i| candidates.get(i)).collect();
        debug!(
            site = %site.name,
            headlines = candidates.len(),
            shortlisted = shortlist.len(),
            "Skimmed headlines"
        );
        shortlist
    }

    async fn deep_read(&self, site: &SiteConfig, candidate: &Candidate, summary: &mut SourceSummary) {
        let text = match self.source.fetch_full_text(&candidate.url).await {
            Ok(text) => text,
            Err(e) => {
                debug!(url = %candidate.url, error = %e, "Failed to fetch article");
                summary.extraction_failed += 1;
                return;
            }
        };
        summary.deep_read += 1;

        let chars = text.chars().count();
        if chars < MIN_FULL_TEXT_CHARS {
            debug!(url = %candidate.url, chars, "Article text too short");
            summary.too_short += 1;
            return;
        }

        let article = Article::from_candidate(candidate, &site.name, &site.language, site.paywall, text);

        let Some(result) = self.backend.score_article(&article).await else {
            summary.score_failed += 1;
            return;
        };
        summary.scored += 1;

        if result.overall_score < self.config.min_score {
            debug!(
                url = %article.url,
                score = result.overall_score,
                min_score = self.config.min_score,
                "Below threshold"
            );
            summary.below_threshold += 1;
            return;
        }

        // Article first; a score never refers to a missing article.
        if let Err(e) = self.store.save_article(&article).await {
            warn!(url = %article.url, error = %e, "Failed to store article");
            summary.write_failed += 1;
            return;
        }
        if let Err(e) = self.store.save_score(&result).await {
            warn!(url = %article.url, error = %e, "Failed to store score");
            summary.write_failed += 1;
            return;
        }

        summary.saved += 1;
        info!(
            score = result.overall_score,
            discipline = %result.primary_discipline,
            title = %article.title,
            "Saved article"
        );
    }
}

/// Sleep unless cancelled first. Returns `false` when the run should stop.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio_test::assert_ok;

    use super::*;
    use crate::testing::{site, FakeBackend, FakeSource, MemoryStore, SkimBehavior};

    fn quick(min_score: u8) -> CuratorConfig {
        CuratorConfig {
            min_score,
            article_delay: DelayRange::NONE,
            source_delay: DelayRange::NONE,
            startup_jitter: Duration::ZERO,
            skip_jitter: true,
        }
    }

    fn curator(
        backend: &Arc<FakeBackend>,
        source: &Arc<FakeSource>,
        store: &Arc<MemoryStore>,
        config: CuratorConfig,
    ) -> Curator {
        Curator::new(backend.clone(), source.clone(), store.clone(), config)
    }

    #[tokio::test]
    async fn scores_and_stores_relevant_articles() {
        let source = Arc::new(FakeSource::default().with_site("DR", &["https://dr.dk/a", "https://dr.dk/b"]));
        let backend = Arc::new(
            FakeBackend::new(SkimBehavior::Unsupported)
                .scoring("https://dr.dk/a", 8)
                .scoring("https://dr.dk/b", 2),
        );
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("DR")], &CancellationToken::new())
            .await;

        assert!(!summary.cancelled);
        assert_eq!(summary.backend, "fake");
        assert_eq!(summary.total_saved(), 1);
        let dr = &summary.sources[0];
        assert_eq!((dr.headlines, dr.skimmed_in, dr.deep_read, dr.scored), (2, 2, 2, 2));
        assert_eq!((dr.candidates, dr.saved, dr.below_threshold), (2, 1, 1));
        assert_eq!(store.write_log(), vec!["article:https://dr.dk/a", "score:https://dr.dk/a"]);

        let stored = store.articles.lock().unwrap()["https://dr.dk/a"].clone();
        assert_eq!(stored.source_name, "DR");
        assert_eq!(stored.summary, "Kort teaser");
        assert!(!stored.has_paywall);
    }

    #[tokio::test]
    async fn paywalled_sites_mark_their_articles() {
        let source = Arc::new(FakeSource::default().with_site("Politiken", &["https://politiken.dk/a"]));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://politiken.dk/a", 7));
        let store = Arc::new(MemoryStore::default());
        let politiken = SiteConfig {
            paywall: true,
            ..site("Politiken")
        };

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[politiken], &CancellationToken::new())
            .await;

        assert_eq!(summary.total_saved(), 1);
        let stored = store.articles.lock().unwrap()["https://politiken.dk/a"].clone();
        assert!(stored.has_paywall);
    }

    #[tokio::test]
    async fn second_run_skips_scored_urls() {
        let source = Arc::new(FakeSource::default().with_site("DR", &["https://dr.dk/a"]));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://dr.dk/a", 9));
        let store = Arc::new(MemoryStore::default());
        let curator = curator(&backend, &source, &store, quick(4));

        curator.run(&[site("DR")], &CancellationToken::new()).await;
        let second = curator.run(&[site("DR")], &CancellationToken::new()).await;

        assert_eq!(backend.scored_urls(), vec!["https://dr.dk/a"]);
        assert_eq!(source.requested(), vec!["https://dr.dk/a"]);
        assert_eq!(second.sources[0].already_seen, 1);
        assert_eq!(second.sources[0].candidates, 0);
        assert_eq!(second.sources[0].to_string(), "DR: 1 headlines, 0 candidates, 0 saved");
        assert_eq!(second.total_saved(), 0);
        assert_eq!(store.score_count(), 1);
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        for (score, expected) in [(4u8, 0usize), (5, 1)] {
            let source = Arc::new(FakeSource::default().with_site("DR", &["https://dr.dk/a"]));
            let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://dr.dk/a", score));
            let store = Arc::new(MemoryStore::default());

            let summary = curator(&backend, &source, &store, quick(5))
                .run(&[site("DR")], &CancellationToken::new())
                .await;

            assert_eq!(summary.total_saved(), expected, "score {score}");
            assert_eq!(store.article_count(), expected);
            assert_eq!(store.score_count(), expected);
        }
    }

    #[tokio::test]
    async fn skim_narrows_what_is_read() {
        let urls = ["https://tv2.dk/0", "https://tv2.dk/1", "https://tv2.dk/2"];
        let source = Arc::new(FakeSource::default().with_site("TV2", &urls));
        let backend = Arc::new(
            FakeBackend::new(SkimBehavior::Keep(vec![2, 0, 7]))
                .scoring(urls[0], 6)
                .scoring(urls[2], 6),
        );
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("TV2")], &CancellationToken::new())
            .await;

        assert_eq!(summary.sources[0].skimmed_in, 2);
        let requested: HashSet<String> = source.requested().into_iter().collect();
        assert_eq!(requested, HashSet::from([urls[0].to_string(), urls[2].to_string()]));
        assert_eq!(summary.total_saved(), 2);
    }

    #[tokio::test]
    async fn failed_skim_reads_everything() {
        let urls = ["https://a.dk/1", "https://a.dk/2"];
        let source = Arc::new(FakeSource::default().with_site("A", &urls));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Fail));
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("A")], &CancellationToken::new())
            .await;

        assert_eq!(*backend.skim_calls.lock().unwrap(), 1);
        assert_eq!(summary.sources[0].skimmed_in, 2);
        assert_eq!(source.requested().len(), 2);
        // No scores configured: every deep read soft-fails.
        assert_eq!(summary.sources[0].score_failed, 2);
        assert_eq!(store.article_count(), 0);
    }

    #[tokio::test]
    async fn site_failure_does_not_stop_the_run() {
        let source = Arc::new(
            FakeSource::default()
                .with_failing_site("Nede")
                .with_site("Oppe", &["https://oppe.dk/1"]),
        );
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://oppe.dk/1", 7));
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("Nede"), site("Oppe")], &CancellationToken::new())
            .await;

        assert_eq!(summary.sources.len(), 2);
        assert!(summary.sources[0].error.as_deref().unwrap().contains("503"));
        assert_eq!(summary.sources[0].headlines, 0);
        assert_eq!(summary.sources[1].saved, 1);
        assert!(summary.sources[0].to_string().contains("error"));
    }

    #[tokio::test]
    async fn item_failures_are_isolated() {
        let urls = [
            "https://x.dk/short",
            "https://x.dk/missing",
            "https://x.dk/malformed",
            "https://x.dk/locked",
            "https://x.dk/good",
        ];
        let mut source = FakeSource::default()
            .with_site("X", &urls)
            .with_text(urls[0], "Kun et par ord.");
        source.texts.remove(urls[1]);
        let source = Arc::new(source);
        let backend = Arc::new(
            FakeBackend::new(SkimBehavior::Unsupported)
                .scoring(urls[3], 9)
                .scoring(urls[4], 9),
        );
        let store = Arc::new(MemoryStore {
            failing_lookups: HashSet::from([urls[3].to_string()]),
            ..Default::default()
        });

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("X")], &CancellationToken::new())
            .await;

        let x = &summary.sources[0];
        assert_eq!(x.too_short, 1);
        assert_eq!(x.extraction_failed, 1);
        assert_eq!(x.score_failed, 1);
        assert_eq!(x.lookup_failed, 1);
        assert_eq!(x.saved, 1);
        assert!(!source.requested().contains(&urls[3].to_string()));
        assert_eq!(store.write_log(), vec!["article:https://x.dk/good", "score:https://x.dk/good"]);
    }

    #[tokio::test]
    async fn failed_article_write_skips_score_write() {
        let source = Arc::new(FakeSource::default().with_site("DR", &["https://dr.dk/a"]));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://dr.dk/a", 9));
        let store = Arc::new(MemoryStore {
            fail_article_writes: true,
            ..Default::default()
        });

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("DR")], &CancellationToken::new())
            .await;

        assert_eq!(summary.sources[0].write_failed, 1);
        assert_eq!(summary.total_saved(), 0);
        assert_eq!(store.score_count(), 0);
    }

    #[tokio::test]
    async fn too_many_headlines_are_dropped_before_skim() {
        let urls: Vec<String> = (0..75).map(|i| format!("https://big.dk/{i}")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let source = Arc::new(FakeSource::default().with_site("Big", &refs));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Keep(vec![])));
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("Big")], &CancellationToken::new())
            .await;

        assert_eq!(summary.sources[0].headlines, MAX_CANDIDATES);
        assert_eq!(summary.sources[0].skimmed_in, 0);
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_processes_nothing() {
        let source = Arc::new(FakeSource::default().with_site("DR", &["https://dr.dk/a"]));
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported).scoring("https://dr.dk/a", 9));
        let store = Arc::new(MemoryStore::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = curator(&backend, &source, &store, quick(4)).run(&[site("DR")], &cancel).await;

        assert!(summary.cancelled);
        assert!(summary.sources.is_empty());
        assert!(backend.scored_urls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_finishes_the_current_article_only() {
        let cancel = CancellationToken::new();
        let mut source = FakeSource::default()
            .with_site("DR", &["https://dr.dk/a", "https://dr.dk/b"])
            .with_site("TV2", &["https://tv2.dk/c"]);
        source.cancel_on_read = Some(cancel.clone());
        let source = Arc::new(source);
        let backend = Arc::new(
            FakeBackend::new(SkimBehavior::Unsupported)
                .scoring("https://dr.dk/a", 9)
                .scoring("https://dr.dk/b", 9)
                .scoring("https://tv2.dk/c", 9),
        );
        let store = Arc::new(MemoryStore::default());

        let summary = curator(&backend, &source, &store, quick(4))
            .run(&[site("DR"), site("TV2")], &cancel)
            .await;

        assert!(summary.cancelled);
        assert_eq!(source.requested(), vec!["https://dr.dk/a"]);
        // The in-flight article still gets both writes.
        assert_eq!(store.write_log(), vec!["article:https://dr.dk/a", "score:https://dr.dk/a"]);
        assert_eq!(summary.sources.len(), 1);
    }

    #[tokio::test]
    async fn long_pauses_are_interruptible() {
        let source = Arc::new(
            FakeSource::default()
                .with_site("DR", &["https://dr.dk/a"])
                .with_site("TV2", &["https://tv2.dk/b"]),
        );
        let backend = Arc::new(FakeBackend::new(SkimBehavior::Unsupported));
        let store = Arc::new(MemoryStore::default());
        let mut config = quick(4);
        config.source_delay = DelayRange::from_secs((3600.0, 3600.0));
        let curator = curator(&backend, &source, &store, config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let summary = assert_ok!(
            tokio::time::timeout(Duration::from_secs(5), curator.run(&[site("DR"), site("TV2")], &cancel)).await
        );
        assert!(summary.cancelled);
        assert_eq!(summary.sources.len(), 1);
    }

    #[test]
    fn delay_sampling_stays_in_bounds() {
        assert_eq!(DelayRange::NONE.sample(), Duration::ZERO);
        assert_eq!(DelayRange::from_secs((2.0, 2.0)).sample(), Duration::from_secs(2));

        let range = DelayRange::from_secs((1.0, 3.0));
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(3));
        }
        assert_eq!(DelayRange::from_secs((-1.0, f64::NAN)), DelayRange::NONE);
    }

    #[test]
    fn audit_line_and_totals() {
        let mut summary = RunSummary::new("gemini");
        summary.sources.push(SourceSummary {
            site: "DR Nyheder".into(),
            headlines: 40,
            skimmed_in: 9,
            already_seen: 3,
            candidates: 6,
            saved: 2,
            ..Default::default()
        });
        summary.sources.push(SourceSummary {
            site: "BBC".into(),
            saved: 3,
            ..Default::default()
        });

        assert_eq!(summary.sources[0].to_string(), "DR Nyheder: 40 headlines, 6 candidates, 2 saved");
        assert_eq!(summary.total_saved(), 5);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["backend"], "gemini");
        assert!(json["sources"][0].get("error").is_none());
    }
}
