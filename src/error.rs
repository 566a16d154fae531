use thiserror::Error;

use crate::records::Scope;

/// Failures raised by the cleaning, feature and dataset stages.
///
/// All of them are fatal for a run: nothing is retried and no partial table is
/// returned to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no {scope} snapshot for {team:?} (season {season}, league match {league_match})")]
    SnapshotNotFound {
        scope: Scope,
        season: i32,
        league_match: u32,
        team: String,
    },

    #[error("column {column:?}: {reason}")]
    Validation { column: String, reason: String },

    #[error("season {season}, league match {league_match}: {detail}")]
    InvariantViolation {
        season: i32,
        league_match: u32,
        detail: String,
    },

    #[error("cannot split dataset: {reason}")]
    Split { reason: String },
}

impl PipelineError {
    pub fn validation(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn invariant(season: i32, league_match: u32, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            season,
            league_match,
            detail: detail.into(),
        }
    }

    pub fn split(reason: impl Into<String>) -> Self {
        Self::Split {
            reason: reason.into(),
        }
    }
}
