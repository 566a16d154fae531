mod common;

use laliga_features::PipelineConfig;
use laliga_features::pipeline::build_feature_table;
use laliga_features::records::{RankingSnapshot, Scope};

/// Every numeric field carries the round it was taken at, so a feature value
/// tells which snapshot it came from.
fn tag(snap: &mut RankingSnapshot, scope_offset: i32) {
    let round = snap.league_match as i32 * 1000 + scope_offset;
    snap.rank_position = round;
    snap.wins = round + 1;
    snap.draws = round + 2;
    snap.losses = round + 3;
    snap.goals_scored = round + 4;
    snap.goals_conceded = round + 5;
}

#[test]
fn features_only_reference_the_previous_round() {
    let mut inputs = common::season(2016);
    for (offset, scope) in [(0, Scope::General), (100, Scope::Home), (200, Scope::Away)] {
        let series = match scope {
            Scope::General => &mut inputs.general,
            Scope::Home => &mut inputs.home,
            Scope::Away => &mut inputs.away,
        };
        for snap in series.iter_mut() {
            tag(snap, offset);
        }
    }

    let table = build_feature_table(&inputs, &PipelineConfig::default()).unwrap();
    assert_eq!(table.len(), 370);

    for (i, row) in table.rows.iter().enumerate() {
        let prior = (row.league_match as f64 - 1.0) * 1000.0;
        for (offset, scope) in [(0.0, "general"), (100.0, "home"), (200.0, "away")] {
            for t in ["t1", "t2"] {
                let base = prior + offset;
                assert_eq!(table.value(i, &format!("{scope}_rank_{t}")), Some(base));
                assert_eq!(table.value(i, &format!("{scope}_wins_{t}")), Some(base + 1.0));
                assert_eq!(table.value(i, &format!("{scope}_losses_{t}")), Some(base + 3.0));
                assert_eq!(
                    table.value(i, &format!("{scope}_goals_conceded_{t}")),
                    Some(base + 5.0)
                );
            }
        }
    }
}

#[test]
fn streaks_never_count_the_current_match() {
    let inputs = common::season(2017);
    let table = build_feature_table(&inputs, &PipelineConfig::default()).unwrap();
    for (i, row) in table.rows.iter().enumerate() {
        let played_before = f64::from(row.league_match - 1);
        for t in ["t1", "t2"] {
            let run: f64 = ["wins", "draws", "losses"]
                .iter()
                .map(|k| table.value(i, &format!("general_{k}_streak_{t}")).unwrap())
                .sum();
            assert!(run >= 1.0, "every team has played by round {}", row.league_match);
            assert!(run <= played_before);
        }
    }
}
