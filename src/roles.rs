use serde::{Deserialize, Serialize};

use crate::records::{Outcome, ResultRow, TeamSlot};

/// First round of the reverse leg in a 20-team, 38-round league.
pub const DEFAULT_SECOND_LEG_START: u32 = 20;

/// A played fixture as listed on the results page: venue order and final score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub season: i32,
    pub league_match: u32,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
}

/// Maps fixtures onto the first-leg naming convention.
///
/// `team_1` is always the side that hosted the first leg. In the reverse leg
/// that side plays away, so the names, the home role and the outcome label are
/// all swapped relative to the listed venue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundFlip {
    pub second_leg_start: u32,
}

impl Default for RoundFlip {
    fn default() -> Self {
        Self {
            second_leg_start: DEFAULT_SECOND_LEG_START,
        }
    }
}

impl RoundFlip {
    pub fn new(second_leg_start: u32) -> Self {
        Self { second_leg_start }
    }

    pub fn is_second_leg(&self, league_match: u32) -> bool {
        league_match >= self.second_leg_start
    }

    pub fn home_role(&self, league_match: u32) -> TeamSlot {
        if self.is_second_leg(league_match) {
            TeamSlot::Team2
        } else {
            TeamSlot::Team1
        }
    }

    /// `raw` is the label relative to the listed venue order (home side first).
    pub fn resolve_outcome(&self, league_match: u32, raw: Outcome) -> Outcome {
        if self.is_second_leg(league_match) {
            raw.swapped()
        } else {
            raw
        }
    }

    pub fn resolve(&self, fixture: &Fixture) -> ResultRow {
        let raw = Outcome::from_goals(fixture.home_goals, fixture.away_goals);
        let outcome = self.resolve_outcome(fixture.league_match, raw);
        let (team_1, team_2) = if self.is_second_leg(fixture.league_match) {
            (fixture.away_team.clone(), fixture.home_team.clone())
        } else {
            (fixture.home_team.clone(), fixture.away_team.clone())
        };
        ResultRow {
            season: fixture.season,
            league_match: fixture.league_match,
            home_role: self.home_role(fixture.league_match).as_str().to_string(),
            team_1,
            team_2,
            outcome: outcome.as_str().to_string(),
        }
    }
}
