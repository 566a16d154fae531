#![allow(dead_code)]

use laliga_features::cleaning::fold_diacritics;
use laliga_features::pipeline::Inputs;
use laliga_features::records::RankingSnapshot;
use laliga_features::roles::{Fixture, RoundFlip};

pub const TEAMS: [&str; 20] = [
    "Athletic Club",
    "Atlético Madrid",
    "Alavés",
    "Barcelona",
    "Betis",
    "Cádiz",
    "Celta",
    "Deportivo",
    "Espanyol",
    "Getafe",
    "Granada",
    "Levante",
    "Málaga",
    "Mallorca",
    "Osasuna",
    "Rayo",
    "Real Madrid",
    "Real Sociedad",
    "Sevilla",
    "Valencia",
];

pub const ROUNDS: u32 = 38;

/// Double round robin: rounds 1..=19 and their mirrors 20..=38 with venues swapped.
pub fn fixtures(season: i32) -> Vec<Fixture> {
    let n = TEAMS.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut out = Vec::new();
    for round in 0..n - 1 {
        for k in 0..n / 2 {
            let (a, b) = (order[k], order[n - 1 - k]);
            let (home, away) = if (round + k) % 2 == 0 { (a, b) } else { (b, a) };
            out.push(fixture(season, round as u32 + 1, home, away));
            out.push(fixture(season, (round + n) as u32, away, home));
        }
        let last = order.pop().unwrap();
        order.insert(1, last);
    }
    out.sort_by_key(|f| f.league_match);
    out
}

fn fixture(season: i32, league_match: u32, home: usize, away: usize) -> Fixture {
    let lm = league_match as usize;
    Fixture {
        season,
        league_match,
        home_team: TEAMS[home].to_string(),
        away_team: TEAMS[away].to_string(),
        home_goals: ((home * 7 + away * 3 + lm + season as usize) % 4) as u32,
        away_goals: ((home * 5 + away * 11 + lm * 3) % 3) as u32,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    played: i32,
    wins: i32,
    draws: i32,
    losses: i32,
    scored: i32,
    conceded: i32,
}

impl Tally {
    fn record(&mut self, scored: u32, conceded: u32) {
        self.played += 1;
        self.scored += scored as i32;
        self.conceded += conceded as i32;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.wins += 1,
            std::cmp::Ordering::Equal => self.draws += 1,
            std::cmp::Ordering::Less => self.losses += 1,
        }
    }

    fn points(&self) -> i32 {
        self.wins * 3 + self.draws
    }
}

/// General, home-only and away-only tables after every round, using the
/// ranking site's spelling (no accents).
pub fn standings(season: i32, fixtures: &[Fixture]) -> [Vec<RankingSnapshot>; 3] {
    let n = TEAMS.len();
    let idx = |name: &str| TEAMS.iter().position(|t| *t == name).unwrap();
    let mut tallies = vec![[Tally::default(); 3]; n];
    let mut out: [Vec<RankingSnapshot>; 3] = Default::default();
    for lm in 1..=ROUNDS {
        for f in fixtures.iter().filter(|f| f.league_match == lm) {
            let (h, a) = (idx(&f.home_team), idx(&f.away_team));
            tallies[h][0].record(f.home_goals, f.away_goals);
            tallies[h][1].record(f.home_goals, f.away_goals);
            tallies[a][0].record(f.away_goals, f.home_goals);
            tallies[a][2].record(f.away_goals, f.home_goals);
        }
        for (s, series) in out.iter_mut().enumerate() {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|x, y| {
                let (tx, ty) = (&tallies[*x][s], &tallies[*y][s]);
                ty.points()
                    .cmp(&tx.points())
                    .then((ty.scored - ty.conceded).cmp(&(tx.scored - tx.conceded)))
                    .then(TEAMS[*x].cmp(TEAMS[*y]))
            });
            for (pos, team) in order.into_iter().enumerate() {
                let t = tallies[team][s];
                series.push(RankingSnapshot {
                    season,
                    league_match: lm,
                    team: fold_diacritics(TEAMS[team]),
                    rank_position: pos as i32 + 1,
                    matches_played: t.played,
                    wins: t.wins,
                    draws: t.draws,
                    losses: t.losses,
                    goals_scored: t.scored,
                    goals_conceded: t.conceded,
                    goals_difference: t.scored - t.conceded,
                    form: String::new(),
                });
            }
        }
    }
    out
}

/// One synthetic season. Results keep the accented spellings and mark the
/// last team with a trailing " *" so name cleaning has work to do.
pub fn season(season: i32) -> Inputs {
    let fixtures = fixtures(season);
    let flip = RoundFlip::default();
    let results = fixtures
        .iter()
        .map(|f| {
            let mut row = flip.resolve(f);
            for name in [&mut row.team_1, &mut row.team_2] {
                if name.as_str() == TEAMS[19] {
                    name.push_str(" *");
                }
            }
            row
        })
        .collect();
    let [general, home, away] = standings(season, &fixtures);
    Inputs {
        results,
        general,
        home,
        away,
    }
}

pub fn seasons(years: &[i32]) -> Inputs {
    let mut out = Inputs::default();
    for year in years {
        let one = season(*year);
        out.results.extend(one.results);
        out.general.extend(one.general);
        out.home.extend(one.home);
        out.away.extend(one.away);
    }
    out
}
