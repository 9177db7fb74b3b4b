//! HTML headline discovery and article text extraction.
//!
//! `scraper::Html` is not `Send`, so everything here is synchronous and the
//! parsed document never lives across an await point.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::models::{truncate_chars, Candidate};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEASER_CHARS: usize = 200;
pub const MAX_FULL_TEXT_CHARS: usize = 6000;

const MIN_TITLE_CHARS: usize = 20;
const MIN_TEASER_CHARS: usize = 30;
const MIN_CONTAINER_CHARS: usize = 300;

/// Links whose text contains any of these are navigation or upsell, not news.
const SKIP_WORDS: &[&str] = &[
    "abonnement",
    "log ind",
    "tilmeld",
    "cookie",
    "podcast",
    "video",
    "galleri",
    "nyhedsbrev",
    "udbyder",
    "kun 1 kr",
    "fuld adgang",
    "subscribe",
    "sign in",
    "newsletter",
];

const ARTICLE_CONTAINERS: &[&str] = &[
    "article",
    "[class*=article-body]",
    "[class*=article__body]",
    "[class*=story-body]",
    "[class*=article-content]",
    "main",
];

const CLUTTER_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "button", "svg",
];

const CLUTTER_CLASSES: &[&str] = &["cookie", "paywall", "newsletter", "related", "share"];

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}

/// Headline links on a front page, in document order.
pub fn extract_headlines(html: &str, page_url: &Url, limit: usize) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let links = selector("a[href]");
    let paragraphs = selector("p");

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for link in document.select(&links) {
        if candidates.len() >= limit {
            break;
        }

        let title = collapse_whitespace(&link.text().collect::<String>());
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        let lower = title.to_lowercase();
        if SKIP_WORDS.iter().any(|word| lower.contains(word)) {
            continue;
        }

        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = page_url.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        candidates.push(Candidate {
            title: truncate_chars(&title, MAX_TITLE_CHARS).to_string(),
            teaser: teaser_near(link, &paragraphs, &title),
            url,
            published: None,
        });
    }

    candidates
}

/// First substantial paragraph in the link's enclosing `article`, else its parent.
fn teaser_near(link: ElementRef<'_>, paragraphs: &Selector, title: &str) -> String {
    let parent = link.parent().and_then(ElementRef::wrap);
    let container = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "article")
        .or(parent);

    let Some(container) = container else {
        return String::new();
    };

    container
        .select(paragraphs)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .find(|text| text.chars().count() > MIN_TEASER_CHARS && text != title)
        .map(|text| truncate_chars(&text, MAX_TEASER_CHARS).to_string())
        .unwrap_or_default()
}

/// Readable body text of an article page, capped at [`MAX_FULL_TEXT_CHARS`].
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let from_container = ARTICLE_CONTAINERS.iter().find_map(|css| {
        let sel = selector(css);
        document
            .select(&sel)
            .map(readable_text)
            .find(|text| text.chars().count() > MIN_CONTAINER_CHARS)
    });

    let text = from_container.unwrap_or_else(|| {
        let body = selector("body");
        document
            .select(&body)
            .next()
            .map(readable_text)
            .unwrap_or_default()
    });

    truncate_chars(&text, MAX_FULL_TEXT_CHARS).to_string()
}

fn readable_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if CLUTTER_TAGS.contains(&el.name()) {
                    continue;
                }
                let cluttered = el
                    .attr("class")
                    .map(|class| {
                        let class = class.to_lowercase();
                        CLUTTER_CLASSES.iter().any(|c| class.contains(c))
                    })
                    .unwrap_or(false);
                if cluttered {
                    continue;
                }
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, out);
                }
            }
            _ => {}
        }
    }
}
