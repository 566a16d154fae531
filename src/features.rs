use std::collections::HashSet;

use rayon::prelude::*;
use tracing::info;

use crate::error::PipelineError;
use crate::records::{MatchResult, Outcome, ResultRow, TeamSlot};
use crate::snapshot::SnapshotIndex;
use crate::stats::{Extractor, StatExtractor, StatField};
use crate::streak::StreakExtractor;

/// Statistics pulled from every ranking series, in column order.
pub const SNAPSHOT_FIELDS: [StatField; 6] = [
    StatField::RankPosition,
    StatField::Wins,
    StatField::Draws,
    StatField::Losses,
    StatField::GoalsScored,
    StatField::GoalsConceded,
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub season: i32,
    pub league_match: u32,
    pub home_role: TeamSlot,
    pub team_1: String,
    pub team_2: String,
    pub outcome: Outcome,
    pub values: Vec<f64>,
}

/// Wide table: one row per match, one value column per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| r.values[idx])
    }
}

/// Ordered composition of extractors over a cleaned results table.
#[derive(Default)]
pub struct FeaturePipeline<'a> {
    extractors: Vec<Box<dyn Extractor + 'a>>,
    parallel: bool,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: impl Extractor + 'a) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rank, win/draw/loss counts, goals and streaks for both teams, taken
    /// from each of the three series in turn.
    pub fn standard(
        general: &'a SnapshotIndex,
        home: &'a SnapshotIndex,
        away: &'a SnapshotIndex,
    ) -> Self {
        let mut pipeline = Self::new();
        for index in [general, home, away] {
            for field in SNAPSHOT_FIELDS {
                pipeline = pipeline.with(StatExtractor::for_both_teams(index, field));
            }
            pipeline = pipeline.with(StreakExtractor::for_both_teams(index));
        }
        pipeline
    }

    pub fn columns(&self) -> Vec<String> {
        self.extractors
            .iter()
            .flat_map(|e| e.columns().iter().cloned())
            .collect()
    }

    pub fn transform(&self, rows: &[ResultRow]) -> Result<FeatureTable, PipelineError> {
        let columns = self.columns();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::validation(
                    column.as_str(),
                    "produced by more than one extractor",
                ));
            }
        }

        let out: Vec<FeatureRow> = if self.parallel {
            // Collect every result first so the reported error is the earliest row's.
            let results: Vec<Result<FeatureRow, PipelineError>> =
                rows.par_iter().map(|row| self.row(row, columns.len())).collect();
            results.into_iter().collect::<Result<_, _>>()?
        } else {
            rows.iter()
                .map(|row| self.row(row, columns.len()))
                .collect::<Result<_, _>>()?
        };

        info!(rows = out.len(), columns = columns.len(), "feature table built");
        Ok(FeatureTable { columns, rows: out })
    }

    fn row(&self, row: &ResultRow, width: usize) -> Result<FeatureRow, PipelineError> {
        let m = MatchResult::try_from(row)?;
        let mut values = Vec::with_capacity(width);
        for extractor in &self.extractors {
            extractor.extract(&m, &mut values)?;
        }
        Ok(FeatureRow {
            season: m.season,
            league_match: m.league_match,
            home_role: m.home_role,
            team_1: m.team_1,
            team_2: m.team_2,
            outcome: m.outcome,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RankingSnapshot, Scope};

    fn snap(league_match: u32, team: &str, wins: i32) -> RankingSnapshot {
        RankingSnapshot {
            season: 2015,
            league_match,
            team: team.to_string(),
            rank_position: 3,
            matches_played: league_match as i32,
            wins,
            draws: 1,
            losses: 0,
            goals_scored: 4,
            goals_conceded: 2,
            goals_difference: 2,
            form: "WD".to_string(),
        }
    }

    fn row(league_match: u32) -> ResultRow {
        ResultRow {
            season: 2015,
            league_match,
            home_role: "team_1".to_string(),
            team_1: "Eibar".to_string(),
            team_2: "Granada".to_string(),
            outcome: "team_2".to_string(),
        }
    }

    fn index(scope: Scope) -> SnapshotIndex {
        SnapshotIndex::build(
            scope,
            vec![
                snap(1, "Eibar", 1),
                snap(1, "Granada", 0),
                snap(2, "Eibar", 2),
                snap(2, "Granada", 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn standard_pipeline_has_one_column_per_stat_scope_and_slot() {
        let (g, h, a) = (index(Scope::General), index(Scope::Home), index(Scope::Away));
        let pipeline = FeaturePipeline::standard(&g, &h, &a);
        let columns = pipeline.columns();
        assert_eq!(columns.len(), 3 * (6 * 2 + 3 * 2));
        assert_eq!(columns[0], "general_rank_t1");
        assert!(columns.contains(&"away_losses_streak_t2".to_string()));

        let table = pipeline.transform(&[row(2), row(3)]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "general_wins_t1"), Some(1.0));
        assert_eq!(table.value(1, "home_wins_t1"), Some(2.0));
        assert_eq!(table.value(1, "away_wins_streak_t2"), Some(1.0));
    }

    #[test]
    fn parallel_matches_sequential() {
        let (g, h, a) = (index(Scope::General), index(Scope::Home), index(Scope::Away));
        let rows = vec![row(2), row(3), row(2)];
        let seq = FeaturePipeline::standard(&g, &h, &a).transform(&rows).unwrap();
        let par = FeaturePipeline::standard(&g, &h, &a)
            .parallel(true)
            .transform(&rows)
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn uncleaned_first_match_is_an_invariant_violation() {
        let g = index(Scope::General);
        let pipeline =
            FeaturePipeline::new().with(StatExtractor::for_both_teams(&g, StatField::Wins));
        let err = pipeline.transform(&[row(2), row(1)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvariantViolation { league_match: 1, .. }));
    }

    #[test]
    fn parallel_reports_earliest_failing_row() {
        let g = index(Scope::General);
        let pipeline = FeaturePipeline::new()
            .with(StatExtractor::for_both_teams(&g, StatField::Wins))
            .parallel(true);
        let err = pipeline.transform(&[row(2), row(9), row(1)]).unwrap_err();
        assert!(matches!(err, PipelineError::SnapshotNotFound { league_match: 8, .. }));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let g = index(Scope::General);
        let pipeline = FeaturePipeline::new()
            .with(StatExtractor::for_both_teams(&g, StatField::Wins))
            .with(StatExtractor::for_both_teams(&g, StatField::Wins));
        assert!(matches!(
            pipeline.transform(&[row(2)]),
            Err(PipelineError::Validation { .. })
        ));
    }
}
