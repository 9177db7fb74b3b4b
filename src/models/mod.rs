mod article;
mod score;

pub use article::{truncate_chars, Article, Candidate, MIN_FULL_TEXT_CHARS};
pub use score::{Discipline, DisciplineScore, ScoredArticleRow, ScoringResult};

#[cfg(test)]
pub use score::PrimaryDiscipline;
