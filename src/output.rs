use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use textwrap::Options;

use crate::error::Result;
use crate::models::{Discipline, ScoredArticleRow};
use crate::pipeline::RunSummary;

const WIDTH: usize = 80;
const INDENT: &str = "     ";

const CSV_HEADER: [&str; 13] = [
    "Titel",
    "Kilde",
    "URL",
    "Publiceret",
    "Sprog",
    "Score",
    "Disciplin",
    "Begrundelse",
    "Sociologi",
    "Politik",
    "Økonomi",
    "Int. Politik",
    "Metode",
];

/// Per-site audit lines followed by the run total.
pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for source in &summary.sources {
        let _ = writeln!(out, "  {source}");
    }
    let _ = write!(
        out,
        "Saved {} new articles from {} sites with {}",
        summary.total_saved(),
        summary.sources.len(),
        summary.backend
    );
    if summary.cancelled {
        out.push_str(" (cancelled)");
    }
    out
}

/// Numbered shortlist with wrapped explanations.
pub fn render_daily(rows: &[ScoredArticleRow]) -> String {
    if rows.is_empty() {
        return "No scored articles to choose from yet.".to_string();
    }

    let options = Options::new(WIDTH)
        .initial_indent(INDENT)
        .subsequent_indent(INDENT);

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. [{:>2}/10] {} ({}, {})",
            i + 1,
            row.overall_score,
            row.title,
            row.source_name,
            row.primary_discipline
        );
        if !row.explanation.is_empty() {
            let _ = writeln!(out, "{}", textwrap::fill(&row.explanation, &options));
        }
        let _ = writeln!(out, "{INDENT}{}", row.url);
    }
    out.trim_end().to_string()
}

/// One line per row, in the given order.
pub fn render_listing(rows: &[ScoredArticleRow]) -> String {
    rows.iter()
        .map(|row| {
            let published = row
                .published
                .map(|p| p.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "----------".to_string());
            format!(
                "{:>2}  {}  {:<20}  {}",
                row.overall_score,
                published,
                truncate_column(&row.source_name, 20),
                row.title
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_column(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width - 1).collect();
        format!("{cut}…")
    }
}

/// Timestamped export file name in `dir`.
pub fn export_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!(
        "samfkurator_{}.{extension}",
        Local::now().format("%Y-%m-%d_%H%M")
    ))
}

pub fn write_json(path: &Path, rows: &[ScoredArticleRow]) -> Result<()> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// One row per article with the five sub-scores as trailing columns.
pub fn write_csv(path: &Path, rows: &[ScoredArticleRow]) -> Result<()> {
    create_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    for row in rows {
        let mut record = vec![
            row.title.clone(),
            row.source_name.clone(),
            row.url.clone(),
            row.published.map(|p| p.to_rfc3339()).unwrap_or_default(),
            row.language.clone(),
            row.overall_score.to_string(),
            row.primary_discipline.as_str().to_string(),
            row.explanation.clone(),
        ];
        record.extend(
            Discipline::ALL
                .into_iter()
                .map(|d| row.disciplines.get(d).to_string()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(std::fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

/// Append the summary as one JSON line.
pub fn append_run_log(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", serde_json::to_string(summary)?)?;
    Ok(())
}
