use std::path::PathBuf;

use laliga_features::PipelineConfig;
use laliga_features::dataset::derive_ratios;
use laliga_features::pipeline::build_feature_table;
use laliga_features::records::TeamSlot;
use laliga_features::tables::{read_inputs, read_results_csv};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mini")
}

#[test]
fn loads_aliased_headers() {
    let dir = fixture_dir();
    let results = read_results_csv(&dir.join("results.csv")).unwrap();
    assert_eq!(results.len(), 7);
    assert_eq!(results[0].home_role, "team_1");
    assert_eq!(results[0].team_1, "*Betis*");

    let inputs = read_inputs(&dir).unwrap();
    assert_eq!(inputs.general.len(), 8);
    assert_eq!(inputs.general[3].rank_position, 4);
    assert_eq!(inputs.general[3].matches_played, 1);
    assert_eq!(inputs.general[0].form, "");
    assert_eq!(inputs.away[0].form, "D");
}

#[test]
fn mini_season_features() {
    let inputs = read_inputs(&fixture_dir()).unwrap();
    let table = build_feature_table(&inputs, &PipelineConfig::default()).unwrap();

    assert_eq!(table.len(), 4);
    let first = &table.rows[0];
    assert_eq!((first.team_1.as_str(), first.team_2.as_str()), ("Celta", "Osasuna"));
    assert_eq!(first.home_role, TeamSlot::Team1);
    assert_eq!(table.value(0, "general_wins_t1"), Some(0.0));
    assert_eq!(table.value(0, "general_rank_t2"), Some(2.0));
    assert_eq!(table.value(0, "general_losses_streak_t1"), Some(1.0));

    assert_eq!(table.value(2, "general_wins_t1"), Some(1.0));
    assert_eq!(table.value(2, "general_draws_t2"), Some(1.0));
    assert_eq!(table.value(2, "general_draws_streak_t1"), Some(1.0));
    assert_eq!(table.value(2, "general_wins_streak_t1"), Some(0.0));
    assert_eq!(table.value(2, "home_wins_streak_t1"), Some(1.0));
    assert_eq!(table.value(2, "away_wins_streak_t2"), Some(1.0));

    assert_eq!(table.value(3, "general_losses_streak_t2"), Some(2.0));
    assert_eq!(table.value(3, "home_goals_conceded_t1"), Some(0.0));

    let ratios = derive_ratios(&table).unwrap();
    let r = ratios.value(2, "general_win_ratio_t1").unwrap();
    assert!((r - 1.0 / 3.0).abs() < 1e-12);
}
