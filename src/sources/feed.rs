use std::collections::HashSet;

use feed_rs::parser;

use crate::error::Result;
use crate::models::{truncate_chars, Candidate};

use super::page::{collapse_whitespace, MAX_TEASER_CHARS, MAX_TITLE_CHARS};

/// Parse an RSS/Atom document into candidates, in feed order.
pub fn candidates_from_feed(bytes: &[u8], limit: usize) -> Result<Vec<Candidate>> {
    let feed = parser::parse(bytes)?;
    let mut seen = HashSet::new();

    let candidates = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone())?;
            let title = collapse_whitespace(&entry.title.map(|t| t.content).unwrap_or_default());
            if title.is_empty() || !seen.insert(url.clone()) {
                return None;
            }

            let teaser = entry
                .summary
                .map(|s| strip_html(&s.content))
                .unwrap_or_default();

            Some(Candidate {
                title: truncate_chars(&title, MAX_TITLE_CHARS).to_string(),
                teaser: truncate_chars(&teaser, MAX_TEASER_CHARS).to_string(),
                url,
                published: entry.published.or(entry.updated),
            })
        })
        .take(limit)
        .collect();

    Ok(candidates)
}

fn strip_html(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 10_000) {
        Ok(text) => collapse_whitespace(&text),
        Err(e) => {
            tracing::debug!(error = %e, "Could not convert feed summary to text");
            collapse_whitespace(html)
        }
    }
}
