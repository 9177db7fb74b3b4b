use async_trait::async_trait;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Article, DisciplineScore, ScoredArticleRow, ScoringResult};

use super::schema::SCHEMA;
use super::ArticleStore;

const SCORED_ROW_SELECT: &str = r#"SELECT a.title, a.source_name, a.url, a.published, a.language,
                                          s.overall_score, s.primary_discipline, s.explanation,
                                          s.sociologi, s.politik, s.okonomi,
                                          s.international_politik, s.metode, s.scored_at
                                   FROM articles a
                                   JOIN scores s ON a.url = s.article_url"#;

/// SQLite-backed store. All timestamps are UTC RFC 3339 with second precision,
/// so string comparison orders them chronologically.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub async fn has_article(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    async fn scored_rows_since(
        &self,
        min_score: u8,
        since: Option<String>,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredArticleRow>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "{SCORED_ROW_SELECT}
                     WHERE s.overall_score >= ?1 AND (?2 IS NULL OR s.scored_at >= ?2)
                     ORDER BY s.overall_score DESC, a.published DESC NULLS LAST
                     LIMIT ?3"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![min_score, since, limit], scored_row_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ArticleStore for Repository {
    async fn has_score(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM scores WHERE article_url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    async fn save_article(&self, article: &Article) -> Result<()> {
        let article = article.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (url, title, source_name, summary, full_text, published,
                                             language, has_paywall, fetched_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                       ON CONFLICT(url) DO UPDATE SET
                           title = excluded.title,
                           source_name = excluded.source_name,
                           summary = excluded.summary,
                           full_text = excluded.full_text,
                           published = excluded.published,
                           language = excluded.language,
                           has_paywall = excluded.has_paywall,
                           fetched_at = excluded.fetched_at"#,
                    params![
                        article.url,
                        article.title,
                        article.source_name,
                        article.summary,
                        article.full_text,
                        article.published.map(format_datetime),
                        article.language,
                        article.has_paywall,
                        format_datetime(article.fetched_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn save_score(&self, result: &ScoringResult) -> Result<()> {
        let result = result.clone();
        self.conn
            .call(move |conn| {
                let d = result.disciplines;
                conn.execute(
                    r#"INSERT INTO scores (article_url, overall_score, sociologi, politik, okonomi,
                                           international_politik, metode, primary_discipline,
                                           explanation, backend_used, scored_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                       ON CONFLICT(article_url) DO UPDATE SET
                           overall_score = excluded.overall_score,
                           sociologi = excluded.sociologi,
                           politik = excluded.politik,
                           okonomi = excluded.okonomi,
                           international_politik = excluded.international_politik,
                           metode = excluded.metode,
                           primary_discipline = excluded.primary_discipline,
                           explanation = excluded.explanation,
                           backend_used = excluded.backend_used,
                           scored_at = excluded.scored_at"#,
                    params![
                        result.article_url,
                        result.overall_score,
                        d.sociologi,
                        d.politik,
                        d.okonomi,
                        d.international_politik,
                        d.metode,
                        result.primary_discipline.as_str(),
                        result.explanation,
                        result.backend_used,
                        format_datetime(result.scored_at),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn scored_articles(&self, min_score: u8, limit: usize) -> Result<Vec<ScoredArticleRow>> {
        self.scored_rows_since(min_score, None, Some(limit)).await
    }

    async fn todays_scored_articles(&self, min_score: u8) -> Result<Vec<ScoredArticleRow>> {
        let since = format_datetime(start_of_local_day());
        self.scored_rows_since(min_score, Some(since), None).await
    }
}

fn start_of_local_day() -> DateTime<Utc> {
    Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() - chrono::Duration::hours(24))
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn scored_row_from_row(row: &Row) -> rusqlite::Result<ScoredArticleRow> {
    let primary: String = row.get(6)?;
    Ok(ScoredArticleRow {
        title: row.get(0)?,
        source_name: row.get(1)?,
        url: row.get(2)?,
        published: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_datetime(&s)),
        language: row.get(4)?,
        overall_score: row.get(5)?,
        primary_discipline: primary.into(),
        explanation: row.get(7)?,
        disciplines: DisciplineScore {
            sociologi: row.get(8)?,
            politik: row.get(9)?,
            okonomi: row.get(10)?,
            international_politik: row.get(11)?,
            metode: row.get(12)?,
        },
        scored_at: row
            .get::<_, String>(13)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
