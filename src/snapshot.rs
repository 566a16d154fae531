use std::collections::HashMap;

use crate::error::PipelineError;
use crate::records::{RankingSnapshot, Scope};

/// Snapshots of one ranking series keyed by (season, round, team).
///
/// The same type backs the general, home-only and away-only series.
#[derive(Debug, Clone)]
pub struct SnapshotIndex {
    scope: Scope,
    rounds: HashMap<(i32, u32), HashMap<String, RankingSnapshot>>,
    len: usize,
}

impl SnapshotIndex {
    /// Fails on a repeated (season, league_match, team) key.
    pub fn build(scope: Scope, snapshots: Vec<RankingSnapshot>) -> Result<Self, PipelineError> {
        let mut rounds: HashMap<(i32, u32), HashMap<String, RankingSnapshot>> = HashMap::new();
        let mut len = 0usize;
        for snap in snapshots {
            let round = rounds.entry((snap.season, snap.league_match)).or_default();
            if round.contains_key(&snap.team) {
                return Err(PipelineError::validation(
                    scope.table_name(),
                    format!(
                        "duplicate snapshot for {:?} at season {}, league match {}",
                        snap.team, snap.season, snap.league_match
                    ),
                ));
            }
            round.insert(snap.team.clone(), snap);
            len += 1;
        }
        Ok(Self { scope, rounds, len })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Snapshot for `team` as it stood before `league_match` was played.
    ///
    /// `league_match` is the target match; the search always runs against the
    /// round before it.
    pub fn lookup(
        &self,
        season: i32,
        league_match: u32,
        team: &str,
    ) -> Result<&RankingSnapshot, PipelineError> {
        let Some(prior) = league_match.checked_sub(1) else {
            return Err(PipelineError::invariant(
                season,
                league_match,
                format!("no round precedes league match 0 ({team})"),
            ));
        };
        self.rounds
            .get(&(season, prior))
            .and_then(|round| round.get(team))
            .ok_or_else(|| PipelineError::SnapshotNotFound {
                scope: self.scope,
                season,
                league_match: prior,
                team: team.to_string(),
            })
    }
}
