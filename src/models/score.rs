use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five curriculum disciplines of Samfundsfag A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    Sociologi,
    Politik,
    Okonomi,
    InternationalPolitik,
    Metode,
}

impl Discipline {
    pub const ALL: [Discipline; 5] = [
        Discipline::Sociologi,
        Discipline::Politik,
        Discipline::Okonomi,
        Discipline::InternationalPolitik,
        Discipline::Metode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Sociologi => "sociologi",
            Discipline::Politik => "politik",
            Discipline::Okonomi => "okonomi",
            Discipline::InternationalPolitik => "international_politik",
            Discipline::Metode => "metode",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Discipline::Sociologi => "Sociologi",
            Discipline::Politik => "Politik",
            Discipline::Okonomi => "Økonomi",
            Discipline::InternationalPolitik => "International politik",
            Discipline::Metode => "Metode",
        }
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Discipline::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

/// Primary discipline as reported by a backend. Values outside the five
/// known identifiers are kept verbatim and form their own selection group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PrimaryDiscipline {
    Known(Discipline),
    Other(String),
}

impl PrimaryDiscipline {
    pub fn as_str(&self) -> &str {
        match self {
            PrimaryDiscipline::Known(d) => d.as_str(),
            PrimaryDiscipline::Other(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PrimaryDiscipline::Known(_))
    }
}

impl From<String> for PrimaryDiscipline {
    fn from(raw: String) -> Self {
        match raw.parse::<Discipline>() {
            Ok(d) => PrimaryDiscipline::Known(d),
            Err(raw) => PrimaryDiscipline::Other(raw),
        }
    }
}

impl From<&str> for PrimaryDiscipline {
    fn from(raw: &str) -> Self {
        PrimaryDiscipline::from(raw.to_string())
    }
}

impl From<PrimaryDiscipline> for String {
    fn from(value: PrimaryDiscipline) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PrimaryDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryDiscipline::Known(d) => f.write_str(d.display_name()),
            PrimaryDiscipline::Other(raw) if raw.is_empty() => f.write_str("?"),
            PrimaryDiscipline::Other(raw) => f.write_str(raw),
        }
    }
}

/// Per-discipline sub-scores, each in `0..=10`. Independent of the overall score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineScore {
    pub sociologi: u8,
    pub politik: u8,
    pub okonomi: u8,
    pub international_politik: u8,
    pub metode: u8,
}

impl DisciplineScore {
    pub fn get(&self, discipline: Discipline) -> u8 {
        match discipline {
            Discipline::Sociologi => self.sociologi,
            Discipline::Politik => self.politik,
            Discipline::Okonomi => self.okonomi,
            Discipline::InternationalPolitik => self.international_politik,
            Discipline::Metode => self.metode,
        }
    }

    pub fn set(&mut self, discipline: Discipline, value: u8) {
        let slot = match discipline {
            Discipline::Sociologi => &mut self.sociologi,
            Discipline::Politik => &mut self.politik,
            Discipline::Okonomi => &mut self.okonomi,
            Discipline::InternationalPolitik => &mut self.international_politik,
            Discipline::Metode => &mut self.metode,
        };
        *slot = value.min(10);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    pub article_url: String,
    pub overall_score: u8,
    pub disciplines: DisciplineScore,
    pub primary_discipline: PrimaryDiscipline,
    pub explanation: String,
    pub backend_used: String,
    pub scored_at: DateTime<Utc>,
}

/// An article joined with its score, as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArticleRow {
    pub title: String,
    pub source_name: String,
    pub url: String,
    pub published: Option<DateTime<Utc>>,
    pub language: String,
    pub overall_score: u8,
    pub primary_discipline: PrimaryDiscipline,
    pub explanation: String,
    pub disciplines: DisciplineScore,
    pub scored_at: DateTime<Utc>,
}
