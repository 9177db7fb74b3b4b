pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- articles table (url is the identity)
CREATE TABLE IF NOT EXISTS articles (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_name TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    full_text TEXT,
    published TEXT,
    language TEXT NOT NULL DEFAULT 'da',
    has_paywall INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published DESC);

-- scores table (one row per article, never without its article)
CREATE TABLE IF NOT EXISTS scores (
    article_url TEXT PRIMARY KEY REFERENCES articles(url),
    overall_score INTEGER NOT NULL CHECK (overall_score BETWEEN 1 AND 10),
    sociologi INTEGER NOT NULL DEFAULT 0,
    politik INTEGER NOT NULL DEFAULT 0,
    okonomi INTEGER NOT NULL DEFAULT 0,
    international_politik INTEGER NOT NULL DEFAULT 0,
    metode INTEGER NOT NULL DEFAULT 0,
    primary_discipline TEXT NOT NULL DEFAULT '',
    explanation TEXT NOT NULL DEFAULT '',
    backend_used TEXT NOT NULL,
    scored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scores_overall ON scores(overall_score DESC);
CREATE INDEX IF NOT EXISTS idx_scores_scored_at ON scores(scored_at);
"#;
