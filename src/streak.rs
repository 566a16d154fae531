//! Current win/draw/loss runs per team.
//!
//! Markers come from the `form` field of the pre-match snapshot, newest first,
//! so streaks obey the same previous-round rule as every other statistic.

use std::collections::HashMap;

use crate::error::PipelineError;
use crate::records::{MatchResult, Outcome, RankingSnapshot, ResultRow, Scope, TeamSlot};
use crate::snapshot::SnapshotIndex;
use crate::stats::{Extractor, feature_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormMarker {
    Win,
    Draw,
    Loss,
}

impl FormMarker {
    pub fn parse(ch: char) -> Result<Self, PipelineError> {
        match ch.to_ascii_uppercase() {
            'W' => Ok(Self::Win),
            'D' => Ok(Self::Draw),
            'L' => Ok(Self::Loss),
            other => Err(PipelineError::validation(
                "form",
                format!("unknown form marker {other:?}"),
            )),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Win => 'W',
            Self::Draw => 'D',
            Self::Loss => 'L',
        }
    }

    /// Result of `outcome` seen from `slot`'s side.
    pub fn for_slot(outcome: Outcome, slot: TeamSlot) -> Self {
        match (outcome, slot) {
            (Outcome::Draw, _) => Self::Draw,
            (Outcome::Team1, TeamSlot::Team1) | (Outcome::Team2, TeamSlot::Team2) => Self::Win,
            _ => Self::Loss,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streak {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl Streak {
    fn of(marker: FormMarker, len: u32) -> Self {
        let mut out = Self::default();
        match marker {
            FormMarker::Win => out.wins = len,
            FormMarker::Draw => out.draws = len,
            FormMarker::Loss => out.losses = len,
        }
        out
    }
}

/// Length of the leading run of identical markers.
///
/// Scanning stops at the first marker that differs from the newest one; nothing
/// after it is looked at.
pub fn compute_streak(markers: &[FormMarker]) -> Streak {
    leading_run(markers.iter().copied().map(Ok)).unwrap_or_default()
}

/// Same as [`compute_streak`] but reads a `W`/`D`/`L` string lazily.
pub fn streak_from_form(form: &str) -> Result<Streak, PipelineError> {
    leading_run(
        form.chars()
            .filter(|c| !c.is_whitespace())
            .map(FormMarker::parse),
    )
}

fn leading_run<I>(mut markers: I) -> Result<Streak, PipelineError>
where
    I: Iterator<Item = Result<FormMarker, PipelineError>>,
{
    let Some(active) = markers.next().transpose()? else {
        return Ok(Streak::default());
    };
    let mut len = 1u32;
    for marker in markers {
        if marker? != active {
            break;
        }
        len += 1;
    }
    Ok(Streak::of(active, len))
}

/// Emits `{scope}_wins_streak_tN`, `_draws_streak_`, `_losses_streak_` per slot.
pub struct StreakExtractor<'a> {
    index: &'a SnapshotIndex,
    slots: Vec<TeamSlot>,
    columns: Vec<String>,
}

impl<'a> StreakExtractor<'a> {
    pub fn new(index: &'a SnapshotIndex, slots: Vec<TeamSlot>) -> Self {
        let columns = slots
            .iter()
            .flat_map(|slot| {
                ["wins_streak", "draws_streak", "losses_streak"]
                    .into_iter()
                    .map(move |stem| feature_column(index, stem, *slot))
            })
            .collect();
        Self {
            index,
            slots,
            columns,
        }
    }

    pub fn for_both_teams(index: &'a SnapshotIndex) -> Self {
        Self::new(index, TeamSlot::BOTH.to_vec())
    }
}

impl Extractor for StreakExtractor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn extract(&self, m: &MatchResult, out: &mut Vec<f64>) -> Result<(), PipelineError> {
        for slot in &self.slots {
            let snap = self.index.lookup(m.season, m.league_match, m.team(*slot))?;
            let streak = streak_from_form(&snap.form)?;
            out.push(f64::from(streak.wins));
            out.push(f64::from(streak.draws));
            out.push(f64::from(streak.losses));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Played {
    league_match: u32,
    at_home: bool,
    marker: FormMarker,
}

/// Per-team results of each season, used to fill snapshot `form` strings when
/// the ranking source does not carry them.
#[derive(Debug, Clone, Default)]
pub struct FormHistory {
    played: HashMap<(i32, String), Vec<Played>>,
}

impl FormHistory {
    /// `rows` must already be free of invalid outcomes; first-round rows are
    /// expected here since they open every team's history.
    pub fn from_results(rows: &[ResultRow]) -> Result<Self, PipelineError> {
        let mut played: HashMap<(i32, String), Vec<Played>> = HashMap::new();
        for row in rows {
            let fail = |what: &str, value: &str| {
                PipelineError::invariant(
                    row.season,
                    row.league_match,
                    format!("{} vs {}: unrecognised {what} {value:?}", row.team_1, row.team_2),
                )
            };
            let outcome =
                Outcome::parse(&row.outcome).ok_or_else(|| fail("outcome", &row.outcome))?;
            let home = TeamSlot::parse(&row.home_role)
                .ok_or_else(|| fail("home role", &row.home_role))?;
            for (slot, team) in [(TeamSlot::Team1, &row.team_1), (TeamSlot::Team2, &row.team_2)] {
                played
                    .entry((row.season, team.clone()))
                    .or_default()
                    .push(Played {
                        league_match: row.league_match,
                        at_home: home == slot,
                        marker: FormMarker::for_slot(outcome, slot),
                    });
            }
        }
        for games in played.values_mut() {
            games.sort_by_key(|g| g.league_match);
        }
        Ok(Self { played })
    }

    /// Markers for rounds `<= league_match`, newest first. The home and away
    /// series only see matches played at that venue.
    pub fn form(&self, scope: Scope, season: i32, league_match: u32, team: &str) -> String {
        let Some(games) = self.played.get(&(season, team.to_string())) else {
            return String::new();
        };
        games
            .iter()
            .rev()
            .filter(|g| g.league_match <= league_match)
            .filter(|g| match scope {
                Scope::General => true,
                Scope::Home => g.at_home,
                Scope::Away => !g.at_home,
            })
            .map(|g| g.marker.as_char())
            .collect()
    }
}

/// Fills empty `form` fields from the results history; existing values win.
pub fn attach_form(
    snapshots: Vec<RankingSnapshot>,
    scope: Scope,
    history: &FormHistory,
) -> Vec<RankingSnapshot> {
    snapshots
        .into_iter()
        .map(|mut snap| {
            if snap.form.is_empty() {
                snap.form = history.form(scope, snap.season, snap.league_match, &snap.team);
            }
            snap
        })
        .collect()
}
