//! Daily selection: a short, diverse list from the scored backlog.

use std::collections::HashMap;

use crate::config::DailyConfig;
use crate::models::ScoredArticleRow;

/// Pick at most `config.count` rows with source and discipline diversity.
///
/// `rows` must already be ordered best first (score, then recency), as the
/// store returns them. Three passes run over the shrinking pool: primary
/// sources up to `min_primary_source`, other sources up to
/// `min_secondary_source`, then everything else in order. Every pass respects
/// `max_per_discipline`. The result is re-sorted by score, stably.
pub fn select_daily(rows: &[ScoredArticleRow], config: &DailyConfig) -> Vec<ScoredArticleRow> {
    let mut selection = Selection {
        pool: rows.iter().collect(),
        picked: Vec::with_capacity(config.count.min(rows.len())),
        per_discipline: HashMap::new(),
        config,
    };

    selection.take(config.min_primary_source, |row| {
        config.is_primary(&row.source_name)
    });
    selection.take(config.min_secondary_source, |row| {
        !config.is_primary(&row.source_name)
    });
    selection.take(config.count, |_| true);

    let mut picked = selection.picked;
    picked.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));
    picked.into_iter().cloned().collect()
}

struct Selection<'a> {
    pool: Vec<&'a ScoredArticleRow>,
    picked: Vec<&'a ScoredArticleRow>,
    per_discipline: HashMap<&'a str, usize>,
    config: &'a DailyConfig,
}

impl<'a> Selection<'a> {
    /// Move up to `quota` eligible rows from the pool, in pool order.
    fn take<F>(&mut self, quota: usize, eligible: F)
    where
        F: Fn(&ScoredArticleRow) -> bool,
    {
        let mut taken = 0;
        let mut i = 0;

        while i < self.pool.len() && taken < quota && self.picked.len() < self.config.count {
            let row = self.pool[i];
            let key = row.primary_discipline.as_str();
            let used = self.per_discipline.get(key).copied().unwrap_or(0);

            if eligible(row) && used < self.config.max_per_discipline {
                self.per_discipline.insert(key, used + 1);
                self.picked.push(self.pool.remove(i));
                taken += 1;
            } else {
                i += 1;
            }
        }
    }
}
