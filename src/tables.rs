//! CSV readers for the tables produced by the results and ranking scrapers.

use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;

use crate::pipeline::Inputs;
use crate::records::{RankingSnapshot, ResultRow, Scope};
use crate::roles::Fixture;

fn read_csv<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("open {what} csv {}", path.display()))?;
    let mut out = Vec::new();
    for (line, row) in reader.deserialize::<T>().enumerate() {
        // +2: header line and 1-based numbering.
        let row = row.with_context(|| format!("{what} csv {} line {}", path.display(), line + 2))?;
        out.push(row);
    }
    Ok(out)
}

/// `season, league_match, home_role, team_1, team_2, outcome`; `home` is accepted
/// for `home_role`.
pub fn read_results_csv(path: &Path) -> Result<Vec<ResultRow>> {
    read_csv(path, "results")
}

/// One ranking series. `form` is optional.
pub fn read_snapshots_csv(path: &Path) -> Result<Vec<RankingSnapshot>> {
    read_csv(path, "ranking")
}

/// Raw fixtures in venue order with final scores.
pub fn read_fixtures_csv(path: &Path) -> Result<Vec<Fixture>> {
    read_csv(path, "fixtures")
}

/// Reads `results.csv` plus `{general,home,away}_ranking.csv` from `dir`.
pub fn read_inputs(dir: &Path) -> Result<Inputs> {
    let series =
        |scope: Scope| read_snapshots_csv(&dir.join(format!("{}.csv", scope.table_name())));
    Ok(Inputs {
        results: read_results_csv(&dir.join("results.csv"))?,
        general: series(Scope::General)?,
        home: series(Scope::Home)?,
        away: series(Scope::Away)?,
    })
}
