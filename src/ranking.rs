//! Top-N module ranking and report rendering

use crate::error::{Result, StatError};
use crate::usage::{OrderedCounter, UsageCounters};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// One row of a ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedModule {
    pub rank: usize,
    pub count: u64,
    pub module: String,
}

/// Reject a top-N request for fewer than one entry
pub fn check_top(n: usize) -> Result<()> {
    if n < 1 {
        return Err(StatError::InvalidArgument(format!(
            "top count must be a positive integer, got {}",
            n
        )));
    }
    Ok(())
}

/// The `n` most counted names, descending; ties keep insertion order
///
/// Fails with `InvalidArgument` when `n` is 0. Returns every name when the
/// counter has fewer than `n`.
pub fn top(counter: &OrderedCounter, n: usize) -> Result<Vec<(String, u64)>> {
    check_top(n)?;

    let mut ranked: Vec<(&str, u64)> = counter.iter().collect();
    // stable sort keeps insertion order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);

    Ok(ranked
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect())
}

/// The `n` most used `epoch/module/version` keys
pub fn top_versions(counters: &UsageCounters, n: usize) -> Result<Vec<(String, u64)>> {
    top(counters.versions(), n)
}

/// Rendered ranking table
#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub rows: Vec<RankedModule>,
}

impl RankingReport {
    /// Rank the `n` most used entries of `counter`
    pub fn from_counter(counter: &OrderedCounter, n: usize) -> Result<Self> {
        Ok(Self::from_ranked(top(counter, n)?))
    }

    /// Number an already ranked `(name, count)` list from 1
    pub fn from_ranked(ranked: Vec<(String, u64)>) -> Self {
        let rows = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (module, count))| RankedModule {
                rank: i + 1,
                count,
                module,
            })
            .collect();
        Self { rows }
    }

    /// Fixed-width text table: `rank count module`
    ///
    /// # Example
    /// ```
    /// use modstat::ranking::RankingReport;
    /// use modstat::usage::OrderedCounter;
    ///
    /// let mut counter = OrderedCounter::new();
    /// counter.bump_or_insert("Python", 12);
    /// counter.bump_or_insert("R", 3);
    /// let report = RankingReport::from_counter(&counter, 5).unwrap();
    /// assert_eq!(
    ///     report.to_text(),
    ///     "#    Count  Module \n1    12     Python \n2    3      R \n"
    /// );
    /// ```
    pub fn to_text(&self) -> String {
        let mut out = String::from("#    Count  Module \n");
        for row in &self.rows {
            out.push_str(&format!("{:<4} {:<6} {} \n", row.rank, row.count, row.module));
        }
        out
    }

    /// JSON array of `{rank, count, module}` objects
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    /// Write the text table to `path`
    pub fn write_text<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_text())?;
        info!(path = %path.as_ref().display(), rows = self.rows.len(), "ranking written");
        Ok(())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the ranking has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
