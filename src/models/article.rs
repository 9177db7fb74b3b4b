use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full text shorter than this is treated as a failed extraction.
pub const MIN_FULL_TEXT_CHARS: usize = 200;

const SCORING_BODY_CHARS: usize = 2000;

/// An unscored headline found on a source page or feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    #[serde(default)]
    pub teaser: String,
    pub url: String,
    /// Known only for feed entries.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub source_name: String,
    pub summary: String,
    pub full_text: Option<String>,
    pub language: String,
    pub has_paywall: bool,
    pub published: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl Article {
    /// Builds the article a candidate turns into once its full text is known.
    pub fn from_candidate(
        candidate: &Candidate,
        source_name: &str,
        language: &str,
        has_paywall: bool,
        full_text: String,
    ) -> Self {
        Self {
            url: candidate.url.clone(),
            title: candidate.title.clone(),
            source_name: source_name.to_string(),
            summary: candidate.teaser.clone(),
            full_text: Some(full_text),
            language: language.to_string(),
            has_paywall,
            published: candidate.published,
            fetched_at: Utc::now(),
        }
    }

    /// Best available text for scoring: title plus truncated full text,
    /// falling back to the summary when extraction produced too little.
    pub fn scoring_text(&self) -> String {
        match &self.full_text {
            Some(text) if text.chars().count() > MIN_FULL_TEXT_CHARS => {
                format!("{}\n\n{}", self.title, truncate_chars(text, SCORING_BODY_CHARS))
            }
            _ => format!("{}\n\n{}", self.title, self.summary),
        }
    }
}

/// Cut `s` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
