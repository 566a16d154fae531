use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::records::{MatchResult, RankingSnapshot, TeamSlot};
use crate::snapshot::SnapshotIndex;

/// Something that turns one match into a fixed set of feature values.
pub trait Extractor: Send + Sync {
    fn columns(&self) -> &[String];

    /// Appends exactly `columns().len()` values to `out`.
    fn extract(&self, m: &MatchResult, out: &mut Vec<f64>) -> Result<(), PipelineError>;
}

/// Named field of a ranking snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    RankPosition,
    MatchesPlayed,
    Wins,
    Draws,
    Losses,
    GoalsScored,
    GoalsConceded,
    GoalsDifference,
}

impl StatField {
    pub fn read(self, snap: &RankingSnapshot) -> i32 {
        match self {
            Self::RankPosition => snap.rank_position,
            Self::MatchesPlayed => snap.matches_played,
            Self::Wins => snap.wins,
            Self::Draws => snap.draws,
            Self::Losses => snap.losses,
            Self::GoalsScored => snap.goals_scored,
            Self::GoalsConceded => snap.goals_conceded,
            Self::GoalsDifference => snap.goals_difference,
        }
    }

    /// Stem used in feature column names.
    pub fn stem(self) -> &'static str {
        match self {
            Self::RankPosition => "rank",
            Self::MatchesPlayed => "matches",
            Self::Wins => "wins",
            Self::Draws => "draws",
            Self::Losses => "losses",
            Self::GoalsScored => "goals_scored",
            Self::GoalsConceded => "goals_conceded",
            Self::GoalsDifference => "goals_difference",
        }
    }
}

/// Reads one snapshot field for each configured team slot.
pub struct StatExtractor<'a> {
    index: &'a SnapshotIndex,
    field: StatField,
    slots: Vec<TeamSlot>,
    columns: Vec<String>,
}

impl<'a> StatExtractor<'a> {
    pub fn new(
        index: &'a SnapshotIndex,
        field: StatField,
        slots: Vec<TeamSlot>,
        columns: Vec<String>,
    ) -> Result<Self, PipelineError> {
        if slots.len() != columns.len() {
            return Err(PipelineError::validation(
                field.stem(),
                format!(
                    "{} team slots configured for {} output columns",
                    slots.len(),
                    columns.len()
                ),
            ));
        }
        Ok(Self {
            index,
            field,
            slots,
            columns,
        })
    }

    /// Both slots, columns named `{scope}_{stem}_t1` / `_t2`.
    pub fn for_both_teams(index: &'a SnapshotIndex, field: StatField) -> Self {
        let columns = TeamSlot::BOTH
            .iter()
            .map(|slot| feature_column(index, field.stem(), *slot))
            .collect();
        Self {
            index,
            field,
            slots: TeamSlot::BOTH.to_vec(),
            columns,
        }
    }
}

impl Extractor for StatExtractor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn extract(&self, m: &MatchResult, out: &mut Vec<f64>) -> Result<(), PipelineError> {
        for slot in &self.slots {
            let snap = self.index.lookup(m.season, m.league_match, m.team(*slot))?;
            out.push(f64::from(self.field.read(snap)));
        }
        Ok(())
    }
}

pub(crate) fn feature_column(index: &SnapshotIndex, stem: &str, slot: TeamSlot) -> String {
    format!("{}_{}_{}", index.scope(), stem, slot.suffix())
}
