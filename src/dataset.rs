use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::PipelineError;
use crate::features::FeatureTable;
use crate::records::{Outcome, Scope, TeamSlot};

pub const PREPROCESSOR_VERSION: u32 = 1;

/// (count stem, ratio stem) pairs turned into per-match ratios.
const RATIO_SOURCES: [(&str, &str); 3] = [("wins", "win"), ("draws", "draw"), ("losses", "loss")];

/// Identifier and raw-count columns removed before encoding.
pub fn default_drop_list() -> Vec<String> {
    let mut out: Vec<String> = ["season", "team_1", "team_2", "league_match"]
        .into_iter()
        .map(String::from)
        .collect();
    for scope in Scope::ALL {
        for (stem, _) in RATIO_SOURCES {
            for slot in TeamSlot::BOTH {
                out.push(format!("{scope}_{stem}_{}", slot.suffix()));
            }
        }
    }
    for scope in [Scope::Home, Scope::Away] {
        for slot in TeamSlot::BOTH {
            out.push(format!("{scope}_rank_{}", slot.suffix()));
        }
    }
    out
}

/// Appends `{scope}_{win,draw,loss}_ratio_tN = {scope}_{wins,draws,losses}_tN / league_match`.
///
/// The divisor is the 1-based index of the match being predicted.
pub fn derive_ratios(table: &FeatureTable) -> Result<FeatureTable, PipelineError> {
    let mut sources = Vec::new();
    let mut names = Vec::new();
    for scope in Scope::ALL {
        for (stem, ratio) in RATIO_SOURCES {
            for slot in TeamSlot::BOTH {
                let source = format!("{scope}_{stem}_{}", slot.suffix());
                let idx = table.column_index(&source).ok_or_else(|| {
                    PipelineError::validation(source.as_str(), "required for ratio derivation")
                })?;
                sources.push(idx);
                names.push(format!("{scope}_{ratio}_ratio_{}", slot.suffix()));
            }
        }
    }

    let mut out = table.clone();
    out.columns.extend(names);
    for row in &mut out.rows {
        let divisor = f64::from(row.league_match);
        for idx in &sources {
            let ratio = row.values[*idx] / divisor;
            row.values.push(ratio);
        }
    }
    Ok(out)
}

/// Feature rows split into string and numeric columns, keyed by a stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTable {
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub rows: Vec<ModelRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    pub id: u64,
    pub categorical: Vec<String>,
    pub numeric: Vec<f64>,
    pub outcome: Outcome,
}

impl ModelTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for row in &self.rows {
            counts[row.outcome.label() as usize] += 1;
        }
        counts
    }

    fn subset(&self, ids: &[usize]) -> Self {
        Self {
            categorical_columns: self.categorical_columns.clone(),
            numeric_columns: self.numeric_columns.clone(),
            rows: ids.iter().map(|i| self.rows[*i].clone()).collect(),
        }
    }
}

/// Drops configured columns and separates categorical from numeric ones.
pub struct FeatureSelector {
    drop: Vec<String>,
}

impl FeatureSelector {
    pub fn new(drop: Vec<String>) -> Self {
        Self { drop }
    }

    pub fn apply(&self, table: &FeatureTable) -> Result<ModelTable, PipelineError> {
        const CATEGORICAL: [&str; 3] = ["home_role", "team_1", "team_2"];
        const IDENTIFIERS: [&str; 2] = ["season", "league_match"];

        for name in &self.drop {
            let known = CATEGORICAL.contains(&name.as_str())
                || IDENTIFIERS.contains(&name.as_str())
                || table.column_index(name).is_some();
            if !known {
                return Err(PipelineError::validation(
                    name.as_str(),
                    "listed for removal but not in the feature table",
                ));
            }
        }
        let keep = |name: &str| !self.drop.iter().any(|d| d == name);

        let categorical_columns: Vec<String> = CATEGORICAL
            .into_iter()
            .filter(|c| keep(*c))
            .map(String::from)
            .collect();
        let kept_ids: Vec<&str> = IDENTIFIERS.into_iter().filter(|c| keep(*c)).collect();
        let mut kept_values: Vec<usize> = (0..table.columns.len())
            .filter(|i| keep(table.columns[*i].as_str()))
            .collect();
        kept_values.sort_by_key(|i| column_group(&table.columns[*i]));
        let numeric_columns: Vec<String> = kept_ids
            .iter()
            .map(|c| c.to_string())
            .chain(kept_values.iter().map(|i| table.columns[*i].clone()))
            .collect();

        let rows = table
            .rows
            .iter()
            .enumerate()
            .map(|(id, row)| {
                let categorical = categorical_columns
                    .iter()
                    .map(|c| match c.as_str() {
                        "home_role" => row.home_role.as_str().to_string(),
                        "team_1" => row.team_1.clone(),
                        _ => row.team_2.clone(),
                    })
                    .collect();
                let numeric = kept_ids
                    .iter()
                    .map(|c| match *c {
                        "season" => f64::from(row.season),
                        _ => f64::from(row.league_match),
                    })
                    .chain(kept_values.iter().map(|i| row.values[*i]))
                    .collect();
                ModelRow {
                    id: id as u64,
                    categorical,
                    numeric,
                    outcome: row.outcome,
                }
            })
            .collect();

        Ok(ModelTable {
            categorical_columns,
            numeric_columns,
            rows,
        })
    }
}

/// Model column order: ranks, then ratios, then goals, then everything else
/// (streaks, raw counts). Extraction order is kept inside each group.
fn column_group(name: &str) -> u8 {
    if name.contains("_rank_") {
        0
    } else if name.contains("_ratio_") {
        1
    } else if name.contains("_goals_") {
        2
    } else {
        3
    }
}

/// Class-stratified split with a fixed seed.
///
/// Each class contributes `floor(n_c * f)` test rows; the rows still needed to
/// reach `ceil(n * f)` go to the classes with the largest fractional parts.
/// Both partitions keep the input row order.
pub fn stratified_split(
    table: &ModelTable,
    test_fraction: f64,
    seed: u64,
) -> Result<(ModelTable, ModelTable), PipelineError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::split(format!(
            "test fraction {test_fraction} is outside (0, 1)"
        )));
    }

    let mut members: Vec<(Outcome, Vec<usize>)> = Outcome::ALL
        .into_iter()
        .map(|class| {
            let ids = table
                .rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.outcome == class)
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            (class, ids)
        })
        .filter(|(_, ids)| !ids.is_empty())
        .collect();
    if members.is_empty() {
        return Err(PipelineError::split("feature table is empty"));
    }

    for (class, ids) in &members {
        if ids.len() < 2 {
            return Err(PipelineError::split(format!(
                "class {class} has {} member(s), at least 2 are required",
                ids.len()
            )));
        }
    }

    let n = table.len() as f64;
    let n_test = (n * test_fraction - 1e-9).ceil() as usize;
    let mut alloc: Vec<usize> = Vec::with_capacity(members.len());
    let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(members.len());
    for (pos, (_, ids)) in members.iter().enumerate() {
        let exact = ids.len() as f64 * test_fraction;
        let floor = (exact + 1e-9).floor();
        alloc.push(floor as usize);
        fractions.push((pos, (exact - floor).max(0.0)));
    }
    let mut remaining = n_test.saturating_sub(alloc.iter().sum());
    fractions.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for (pos, _) in &fractions {
        if remaining == 0 {
            break;
        }
        alloc[*pos] += 1;
        remaining -= 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_ids = Vec::new();
    let mut test_ids = Vec::new();
    for ((class, ids), take) in members.iter_mut().zip(&alloc) {
        if *take == 0 || *take >= ids.len() {
            return Err(PipelineError::split(format!(
                "class {class} has {} member(s), too few for a test fraction of {test_fraction}",
                ids.len()
            )));
        }
        ids.shuffle(&mut rng);
        test_ids.extend_from_slice(&ids[..*take]);
        train_ids.extend_from_slice(&ids[*take..]);
        info!(class = %class, train = ids.len() - take, test = take, "stratified split");
    }
    train_ids.sort_unstable();
    test_ids.sort_unstable();

    Ok((table.subset(&train_ids), table.subset(&test_ids)))
}

/// Per-column mean and standard deviation, fitted on the training rows only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Population variance; a constant column gets a scale of 1.
    pub fn fit(samples: &[Vec<f64>], width: usize) -> Result<Self, PipelineError> {
        if samples.is_empty() {
            return Err(PipelineError::validation(
                "numeric",
                "cannot fit a scaler on zero rows",
            ));
        }
        let n = samples.len() as f64;
        let mut means = vec![0.0_f64; width];
        for row in samples {
            for (acc, v) in means.iter_mut().zip(row) {
                *acc += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }
        let mut vars = vec![0.0_f64; width];
        for row in samples {
            for ((acc, v), m) in vars.iter_mut().zip(row).zip(&means) {
                *acc += (v - m).powi(2);
            }
        }
        let scales = vars
            .into_iter()
            .map(|v| {
                let var = v / n;
                if var > 0.0 { var.sqrt() } else { 1.0 }
            })
            .collect();
        Ok(Self { means, scales })
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Passthrough,
    OneHot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Training,
    Test,
}

impl Partition {
    pub fn id_column(self) -> &'static str {
        match self {
            Self::Training => "training_id",
            Self::Test => "test_id",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Training => "training_data.parquet",
            Self::Test => "test_data.parquet",
        }
    }
}

/// Encoded rows ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPartition {
    pub partition: Partition,
    pub created_on: NaiveDate,
    /// Pass-through categorical columns, written as strings.
    pub text_columns: Vec<String>,
    /// One-hot indicators followed by the standardised numeric columns.
    pub value_columns: Vec<String>,
    pub rows: Vec<EncodedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub id: u64,
    pub text: Vec<String>,
    pub values: Vec<f64>,
    pub outcome: Outcome,
}

impl EncodedPartition {
    pub fn id_column(&self) -> &'static str {
        self.partition.id_column()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything needed to encode new rows exactly as the training rows were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    pub version: u32,
    pub encoding: Encoding,
    pub categorical_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    /// Sorted categories per categorical column; empty when passing through.
    pub one_hot_categories: Vec<Vec<String>>,
    pub scaler: StandardScaler,
    /// Hex SHA-256 of the encoding and ordered input columns.
    pub fingerprint: String,
}

impl FittedPreprocessor {
    pub fn fit(train: &ModelTable, encoding: Encoding) -> Result<Self, PipelineError> {
        let samples: Vec<Vec<f64>> = train.rows.iter().map(|r| r.numeric.clone()).collect();
        let scaler = StandardScaler::fit(&samples, train.numeric_columns.len())?;
        let one_hot_categories = match encoding {
            Encoding::Passthrough => Vec::new(),
            Encoding::OneHot => (0..train.categorical_columns.len())
                .map(|c| {
                    let mut cats: Vec<String> =
                        train.rows.iter().map(|r| r.categorical[c].clone()).collect();
                    cats.sort();
                    cats.dedup();
                    cats
                })
                .collect(),
        };
        Ok(Self {
            version: PREPROCESSOR_VERSION,
            encoding,
            categorical_columns: train.categorical_columns.clone(),
            numeric_columns: train.numeric_columns.clone(),
            one_hot_categories,
            scaler,
            fingerprint: fingerprint(
                encoding,
                &train.categorical_columns,
                &train.numeric_columns,
            ),
        })
    }

    /// Column names of the encoded output, text columns first.
    pub fn output_columns(&self) -> (Vec<String>, Vec<String>) {
        match self.encoding {
            Encoding::Passthrough => (
                self.categorical_columns.clone(),
                self.numeric_columns.clone(),
            ),
            Encoding::OneHot => {
                let mut values = Vec::new();
                let categories = self.categorical_columns.iter().zip(&self.one_hot_categories);
                for (column, cats) in categories {
                    for cat in cats {
                        values.push(one_hot_column(column, cat));
                    }
                }
                values.extend(self.numeric_columns.iter().cloned());
                (Vec::new(), values)
            }
        }
    }

    /// Encodes `table` with the fitted parameters; never refits.
    pub fn transform(
        &self,
        table: &ModelTable,
        partition: Partition,
        created_on: NaiveDate,
    ) -> Result<EncodedPartition, PipelineError> {
        if table.categorical_columns != self.categorical_columns
            || table.numeric_columns != self.numeric_columns
        {
            return Err(PipelineError::validation(
                "columns",
                "table layout does not match the fitted preprocessor",
            ));
        }
        let (text_columns, value_columns) = self.output_columns();
        let rows = table
            .rows
            .iter()
            .map(|row| {
                let mut values = Vec::with_capacity(value_columns.len());
                let text = match self.encoding {
                    Encoding::Passthrough => row.categorical.clone(),
                    Encoding::OneHot => {
                        for (value, cats) in row.categorical.iter().zip(&self.one_hot_categories) {
                            values.extend(cats.iter().map(|c| if c == value { 1.0 } else { 0.0 }));
                        }
                        Vec::new()
                    }
                };
                values.extend(self.scaler.transform(&row.numeric));
                EncodedRow {
                    id: row.id,
                    text,
                    values,
                    outcome: row.outcome,
                }
            })
            .collect();
        Ok(EncodedPartition {
            partition,
            created_on,
            text_columns,
            value_columns,
            rows,
        })
    }

    /// Pretty JSON; floats are written so they parse back to the same bits.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize preprocessor")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, self.to_json()?).context("write preprocessor")?;
        fs::rename(&tmp, path).context("swap preprocessor")?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read preprocessor {}", path.display()))?;
        let out: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid preprocessor {}", path.display()))?;
        if out.version != PREPROCESSOR_VERSION {
            return Err(anyhow!(
                "preprocessor version {} is not supported (expected {PREPROCESSOR_VERSION})",
                out.version
            ));
        }
        let expected = fingerprint(out.encoding, &out.categorical_columns, &out.numeric_columns);
        if out.fingerprint != expected {
            return Err(anyhow!("preprocessor fingerprint mismatch in {}", path.display()));
        }
        Ok(out)
    }
}

fn fingerprint(encoding: Encoding, categorical: &[String], numeric: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{encoding:?}\n"));
    for column in categorical {
        hasher.update(b"c:");
        hasher.update(column.as_bytes());
        hasher.update(b"\n");
    }
    for column in numeric {
        hasher.update(b"n:");
        hasher.update(column.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn one_hot_column(column: &str, category: &str) -> String {
    let clean: String = category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{column}_{clean}")
}
