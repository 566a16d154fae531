use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Which side won a fixture, always relative to the `team_1`/`team_2` naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "team_1")]
    Team1,
    #[serde(rename = "team_2")]
    Team2,
    #[serde(rename = "draw")]
    Draw,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Team1, Outcome::Team2, Outcome::Draw];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "team_1" => Some(Self::Team1),
            "team_2" => Some(Self::Team2),
            "draw" => Some(Self::Draw),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Team1 => "team_1",
            Self::Team2 => "team_2",
            Self::Draw => "draw",
        }
    }

    /// Integer class used by the training collaborator.
    pub fn label(self) -> i32 {
        match self {
            Self::Team1 => 0,
            Self::Team2 => 1,
            Self::Draw => 2,
        }
    }

    pub fn swapped(self) -> Self {
        match self {
            Self::Team1 => Self::Team2,
            Self::Team2 => Self::Team1,
            Self::Draw => Self::Draw,
        }
    }

    pub fn from_goals(team_1_goals: u32, team_2_goals: u32) -> Self {
        if team_1_goals > team_2_goals {
            Self::Team1
        } else if team_1_goals < team_2_goals {
            Self::Team2
        } else {
            Self::Draw
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamSlot {
    #[serde(rename = "team_1")]
    Team1,
    #[serde(rename = "team_2")]
    Team2,
}

impl TeamSlot {
    pub const BOTH: [TeamSlot; 2] = [TeamSlot::Team1, TeamSlot::Team2];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "team_1" => Some(Self::Team1),
            "team_2" => Some(Self::Team2),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Team1 => "team_1",
            Self::Team2 => "team_2",
        }
    }

    /// Column suffix used in feature names (`general_wins_t1`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Team1 => "t1",
            Self::Team2 => "t2",
        }
    }
}

/// One of the three independent ranking series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    General,
    Home,
    Away,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::General, Scope::Home, Scope::Away];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Home => "home",
            Self::Away => "away",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::General => "general_ranking",
            Self::Home => "home_ranking",
            Self::Away => "away_ranking",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level access used by the cleaning steps.
pub trait Record: Clone + Send + Sync + 'static {
    const TEXT_COLUMNS: &'static [&'static str];
    const INTEGER_COLUMNS: &'static [&'static str];

    /// Mutable handle to a string column. Only called after `check_text_column`.
    fn text_mut(&mut self, column: &str) -> Option<&mut String>;

    fn check_text_column(column: &str) -> Result<(), PipelineError> {
        if Self::TEXT_COLUMNS.contains(&column) {
            Ok(())
        } else if Self::INTEGER_COLUMNS.contains(&column) {
            Err(PipelineError::validation(
                column,
                "expected a string column, found an integer column",
            ))
        } else {
            Err(PipelineError::validation(column, "no such column"))
        }
    }
}

/// A results row as received from the parsing collaborator, before cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub season: i32,
    pub league_match: u32,
    #[serde(alias = "home")]
    pub home_role: String,
    pub team_1: String,
    pub team_2: String,
    pub outcome: String,
}

impl Record for ResultRow {
    const TEXT_COLUMNS: &'static [&'static str] = &["home_role", "team_1", "team_2", "outcome"];
    const INTEGER_COLUMNS: &'static [&'static str] = &["season", "league_match"];

    fn text_mut(&mut self, column: &str) -> Option<&mut String> {
        match column {
            "home_role" => Some(&mut self.home_role),
            "team_1" => Some(&mut self.team_1),
            "team_2" => Some(&mut self.team_2),
            "outcome" => Some(&mut self.outcome),
            _ => None,
        }
    }
}

/// A cleaned, typed match ready for feature computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub season: i32,
    pub league_match: u32,
    pub home_role: TeamSlot,
    pub team_1: String,
    pub team_2: String,
    pub outcome: Outcome,
}

impl MatchResult {
    pub fn team(&self, slot: TeamSlot) -> &str {
        match slot {
            TeamSlot::Team1 => &self.team_1,
            TeamSlot::Team2 => &self.team_2,
        }
    }
}

impl TryFrom<&ResultRow> for MatchResult {
    type Error = PipelineError;

    fn try_from(row: &ResultRow) -> Result<Self, Self::Error> {
        let fail = |detail: String| {
            PipelineError::invariant(
                row.season,
                row.league_match,
                format!("{} vs {}: {detail}", row.team_1, row.team_2),
            )
        };
        if row.league_match <= 1 {
            return Err(fail(
                "league match has no prior ranking snapshot".to_string(),
            ));
        }
        let outcome = Outcome::parse(&row.outcome)
            .ok_or_else(|| fail(format!("unrecognised outcome {:?}", row.outcome)))?;
        let home_role = TeamSlot::parse(&row.home_role)
            .ok_or_else(|| fail(format!("unrecognised home role {:?}", row.home_role)))?;
        Ok(Self {
            season: row.season,
            league_match: row.league_match,
            home_role,
            team_1: row.team_1.clone(),
            team_2: row.team_2.clone(),
            outcome,
        })
    }
}

/// A team's cumulative table position after `league_match` rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub season: i32,
    pub league_match: u32,
    pub team: String,
    #[serde(alias = "rank_pos")]
    pub rank_position: i32,
    #[serde(alias = "matches")]
    pub matches_played: i32,
    pub wins: i32,
    pub draws: i32,
    pub losses: i32,
    pub goals_scored: i32,
    pub goals_conceded: i32,
    pub goals_difference: i32,
    /// Recent results as `W`/`D`/`L` markers, newest first.
    #[serde(default)]
    pub form: String,
}

impl Record for RankingSnapshot {
    const TEXT_COLUMNS: &'static [&'static str] = &["team", "form"];
    const INTEGER_COLUMNS: &'static [&'static str] = &[
        "season",
        "league_match",
        "rank_position",
        "matches_played",
        "wins",
        "draws",
        "losses",
        "goals_scored",
        "goals_conceded",
        "goals_difference",
    ];

    fn text_mut(&mut self, column: &str) -> Option<&mut String> {
        match column {
            "team" => Some(&mut self.team),
            "form" => Some(&mut self.form),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(league_match: u32, outcome: &str) -> ResultRow {
        ResultRow {
            season: 2001,
            league_match,
            home_role: "team_1".to_string(),
            team_1: "Valencia".to_string(),
            team_2: "Sevilla".to_string(),
            outcome: outcome.to_string(),
        }
    }

    #[test]
    fn typed_conversion_rejects_first_match_and_bad_outcome() {
        assert!(matches!(
            MatchResult::try_from(&row(1, "team_1")),
            Err(PipelineError::InvariantViolation { league_match: 1, .. })
        ));
        assert!(matches!(
            MatchResult::try_from(&row(5, "abandoned")),
            Err(PipelineError::InvariantViolation { .. })
        ));
        let ok = MatchResult::try_from(&row(5, "draw")).unwrap();
        assert_eq!(ok.outcome, Outcome::Draw);
        assert_eq!(ok.team(TeamSlot::Team2), "Sevilla");
    }

    #[test]
    fn integer_columns_are_not_text() {
        assert!(ResultRow::check_text_column("team_1").is_ok());
        assert!(matches!(
            ResultRow::check_text_column("season"),
            Err(PipelineError::Validation { .. })
        ));
        assert!(RankingSnapshot::check_text_column("wins").is_err());
        assert!(RankingSnapshot::check_text_column("nickname").is_err());
    }

    #[test]
    fn outcome_labels_follow_training_convention() {
        assert_eq!(Outcome::Team1.label(), 0);
        assert_eq!(Outcome::Team2.label(), 1);
        assert_eq!(Outcome::Draw.label(), 2);
        assert_eq!(Outcome::Draw.swapped(), Outcome::Draw);
        assert_eq!(Outcome::from_goals(3, 1), Outcome::Team1);
    }
}
