use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::records::{Outcome, RankingSnapshot, Record, ResultRow};

pub const DEFAULT_STRIP_CHARACTERS: &str = "\n* ";

/// One row-level transform. Steps consume a table and hand back a new one.
pub trait CleaningStep<R: Record>: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, rows: Vec<R>) -> Result<Vec<R>, PipelineError>;
}

/// Ordered list of steps applied left to right.
pub struct CleaningPipeline<R: Record> {
    steps: Vec<Box<dyn CleaningStep<R>>>,
}

impl<R: Record> Default for CleaningPipeline<R> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<R: Record> CleaningPipeline<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: impl CleaningStep<R> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step; the input table is left untouched.
    pub fn run(&self, rows: &[R]) -> Result<Vec<R>, PipelineError> {
        let mut table = rows.to_vec();
        for step in &self.steps {
            let before = table.len();
            table = step.apply(table)?;
            debug!(step = step.name(), before, after = table.len(), "cleaning step");
        }
        Ok(table)
    }
}

/// Name-level steps shared by the results and ranking tables, in the order
/// they must run: strip, fold, then alias.
fn name_steps<R: Record>(
    cfg: &PipelineConfig,
    columns: &[String],
    pipeline: CleaningPipeline<R>,
) -> CleaningPipeline<R> {
    let mut pipeline = pipeline.with(NormalizeTeamName::new(
        columns.to_vec(),
        cfg.strip_characters.clone(),
    ));
    if cfg.fold_diacritics {
        pipeline = pipeline.with(FoldDiacritics::new(columns.to_vec()));
    }
    pipeline.with(RenameTeam::new(columns.to_vec(), cfg.team_aliases.clone()))
}

/// Results cleaning up to, but excluding, the first-match filter. Rows that
/// come out of this are what team form is derived from.
pub fn results_history_pipeline(cfg: &PipelineConfig) -> CleaningPipeline<ResultRow> {
    name_steps(cfg, &cfg.result_team_columns, CleaningPipeline::new()).with(RemoveInvalidOutcome)
}

pub fn results_pipeline(cfg: &PipelineConfig) -> CleaningPipeline<ResultRow> {
    results_history_pipeline(cfg).with(RemoveFirstMatch)
}

pub fn snapshot_pipeline(cfg: &PipelineConfig) -> CleaningPipeline<RankingSnapshot> {
    name_steps(cfg, &cfg.snapshot_team_columns, CleaningPipeline::new())
}

/// Drops every `league_match == 1` row; those matches have no prior snapshot.
pub struct RemoveFirstMatch;

impl CleaningStep<ResultRow> for RemoveFirstMatch {
    fn name(&self) -> &'static str {
        "remove_first_match"
    }

    fn apply(&self, rows: Vec<ResultRow>) -> Result<Vec<ResultRow>, PipelineError> {
        Ok(rows.into_iter().filter(|r| r.league_match != 1).collect())
    }
}

pub struct RemoveInvalidOutcome;

impl CleaningStep<ResultRow> for RemoveInvalidOutcome {
    fn name(&self) -> &'static str {
        "remove_invalid_outcome"
    }

    fn apply(&self, rows: Vec<ResultRow>) -> Result<Vec<ResultRow>, PipelineError> {
        Ok(rows
            .into_iter()
            .filter(|r| Outcome::parse(&r.outcome).is_some())
            .collect())
    }
}

/// Strips a set of characters from both ends of the configured columns.
pub struct NormalizeTeamName {
    columns: Vec<String>,
    characters: String,
}

impl NormalizeTeamName {
    pub fn new(columns: Vec<String>, characters: impl Into<String>) -> Self {
        Self {
            columns,
            characters: characters.into(),
        }
    }
}

impl<R: Record> CleaningStep<R> for NormalizeTeamName {
    fn name(&self) -> &'static str {
        "normalize_team_name"
    }

    fn apply(&self, rows: Vec<R>) -> Result<Vec<R>, PipelineError> {
        let strip = |c: char| self.characters.contains(c);
        map_text_columns(rows, &self.columns, |value| {
            value.trim_matches(strip).to_string()
        })
    }
}

static DIACRITICS: Lazy<HashMap<char, char>> = Lazy::new(|| {
    let pairs: [(&str, char); 18] = [
        ("ÀÁÂÃÄª", 'A'),
        ("àáâãä", 'a'),
        ("ÈÉÊË", 'E'),
        ("èéêë", 'e'),
        ("ÍÌÎÏ", 'I'),
        ("íìîï", 'i'),
        ("ÒÓÔÕÖº", 'O'),
        ("òóôõö", 'o'),
        ("ÙÚÛÜ", 'U'),
        ("ùúûü", 'u'),
        ("Ñ", 'N'),
        ("ñ", 'n'),
        ("Ç", 'C'),
        ("ç", 'c'),
        ("§", 'S'),
        ("³", '3'),
        ("²", '2'),
        ("¹", '1'),
    ];
    let mut map = HashMap::new();
    for (from, to) in pairs {
        for ch in from.chars() {
            map.insert(ch, to);
        }
    }
    map
});

pub fn fold_diacritics(value: &str) -> String {
    value
        .chars()
        .map(|ch| DIACRITICS.get(&ch).copied().unwrap_or(ch))
        .collect()
}

/// Replaces accented Latin letters with their ASCII base letter.
pub struct FoldDiacritics {
    columns: Vec<String>,
}

impl FoldDiacritics {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl<R: Record> CleaningStep<R> for FoldDiacritics {
    fn name(&self) -> &'static str {
        "fold_diacritics"
    }

    fn apply(&self, rows: Vec<R>) -> Result<Vec<R>, PipelineError> {
        map_text_columns(rows, &self.columns, fold_diacritics)
    }
}

/// Whole-value alias replacement so every table spells a team the same way.
pub struct RenameTeam {
    columns: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl RenameTeam {
    pub fn new(columns: Vec<String>, aliases: BTreeMap<String, String>) -> Self {
        Self { columns, aliases }
    }
}

impl<R: Record> CleaningStep<R> for RenameTeam {
    fn name(&self) -> &'static str {
        "rename_team"
    }

    fn apply(&self, rows: Vec<R>) -> Result<Vec<R>, PipelineError> {
        map_text_columns(rows, &self.columns, |value| {
            self.aliases
                .get(value)
                .cloned()
                .unwrap_or_else(|| value.to_string())
        })
    }
}

fn map_text_columns<R, F>(
    mut rows: Vec<R>,
    columns: &[String],
    f: F,
) -> Result<Vec<R>, PipelineError>
where
    R: Record,
    F: Fn(&str) -> String,
{
    for column in columns {
        R::check_text_column(column)?;
    }
    for row in &mut rows {
        for column in columns {
            let Some(value) = row.text_mut(column) else {
                return Err(PipelineError::validation(column.as_str(), "no such column"));
            };
            *value = f(value);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ResultRow> {
        [(1, "barsa\n"), (2, "*madrid*"), (3, "valencia "), (4, "Gimnàstic Tarragona*")]
            .into_iter()
            .map(|(league_match, team)| ResultRow {
                season: 1999,
                league_match,
                home_role: "team_1".to_string(),
                team_1: team.to_string(),
                team_2: "Oviedo".to_string(),
                outcome: "draw".to_string(),
            })
            .collect()
    }

    #[test]
    fn normalize_strips_markup_from_both_ends() {
        let step = NormalizeTeamName::new(vec!["team_1".into()], DEFAULT_STRIP_CHARACTERS);
        let out = CleaningStep::<ResultRow>::apply(&step, rows()).unwrap();
        let names: Vec<_> = out.iter().map(|r| r.team_1.as_str()).collect();
        assert_eq!(names, ["barsa", "madrid", "valencia", "Gimnàstic Tarragona"]);
    }

    #[test]
    fn normalize_rejects_integer_column() {
        let step = NormalizeTeamName::new(vec!["season".into()], DEFAULT_STRIP_CHARACTERS);
        let err = CleaningStep::<ResultRow>::apply(&step, rows()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { column, .. } if column == "season"));
    }

    #[test]
    fn pipeline_runs_in_order_and_leaves_input_alone() {
        let input = rows();
        let pipeline = CleaningPipeline::new()
            .with(RemoveFirstMatch)
            .with(NormalizeTeamName::new(
                vec!["team_1".into()],
                DEFAULT_STRIP_CHARACTERS,
            ))
            .with(RenameTeam::new(
                vec!["team_1".into()],
                BTreeMap::from([("Gimnàstic Tarragona".to_string(), "Gimnàstic".to_string())]),
            ));
        let out = pipeline.run(&input).unwrap();
        let got: Vec<_> = out
            .iter()
            .map(|r| (r.league_match, r.team_1.as_str()))
            .collect();
        assert_eq!(got, [(2, "madrid"), (3, "valencia"), (4, "Gimnàstic")]);
        assert_eq!(input[0].team_1, "barsa\n");
    }

    #[test]
    fn invalid_outcomes_are_dropped() {
        let mut input = rows();
        input[2].outcome = "postponed".to_string();
        let out = RemoveInvalidOutcome.apply(input).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| Outcome::parse(&r.outcome).is_some()));
    }

    #[test]
    fn diacritics_fold_to_ascii() {
        assert_eq!(fold_diacritics("Atlético Málaga"), "Atletico Malaga");
        assert_eq!(fold_diacritics("Alavés Logroñés"), "Alaves Logrones");
    }
}
