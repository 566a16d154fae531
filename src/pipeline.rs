//! End-to-end run: cleaning, feature extraction and dataset assembly.

use chrono::NaiveDate;
use tracing::info;

use crate::cleaning::{CleaningStep, RemoveFirstMatch, results_history_pipeline, snapshot_pipeline};
use crate::config::PipelineConfig;
use crate::dataset::{
    EncodedPartition, FeatureSelector, FittedPreprocessor, Partition, derive_ratios,
    stratified_split,
};
use crate::error::PipelineError;
use crate::features::{FeaturePipeline, FeatureTable};
use crate::records::{RankingSnapshot, ResultRow, Scope};
use crate::snapshot::SnapshotIndex;
use crate::streak::{FormHistory, attach_form};

/// The four tables handed over by the scrapers, uncleaned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    pub results: Vec<ResultRow>,
    pub general: Vec<RankingSnapshot>,
    pub home: Vec<RankingSnapshot>,
    pub away: Vec<RankingSnapshot>,
}

impl Inputs {
    pub fn series(&self, scope: Scope) -> &[RankingSnapshot] {
        match scope {
            Scope::General => &self.general,
            Scope::Home => &self.home,
            Scope::Away => &self.away,
        }
    }
}

/// Cleans every table, fills missing form strings and extracts the wide
/// per-match table. Ratios are not derived here.
pub fn build_feature_table(
    inputs: &Inputs,
    cfg: &PipelineConfig,
) -> Result<FeatureTable, PipelineError> {
    let history_rows = results_history_pipeline(cfg).run(&inputs.results)?;
    let history = FormHistory::from_results(&history_rows)?;
    let results = RemoveFirstMatch.apply(history_rows)?;

    let cleaner = snapshot_pipeline(cfg);
    let mut indexes = Vec::with_capacity(Scope::ALL.len());
    for scope in Scope::ALL {
        let cleaned = cleaner.run(inputs.series(scope))?;
        let snapshots = attach_form(cleaned, scope, &history);
        indexes.push(SnapshotIndex::build(scope, snapshots)?);
    }
    info!(
        results = results.len(),
        general = indexes[0].len(),
        home = indexes[1].len(),
        away = indexes[2].len(),
        "inputs cleaned"
    );

    FeaturePipeline::standard(&indexes[0], &indexes[1], &indexes[2])
        .parallel(cfg.parallel)
        .transform(&results)
}

/// Output of a full run, ready to be written.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    pub features: FeatureTable,
    pub preprocessor: FittedPreprocessor,
    pub training: EncodedPartition,
    pub test: EncodedPartition,
}

/// Full run. `created_on` only stamps the partitions; no feature depends on it.
pub fn build_datasets(
    inputs: &Inputs,
    cfg: &PipelineConfig,
    created_on: NaiveDate,
) -> Result<DatasetBundle, PipelineError> {
    let features = derive_ratios(&build_feature_table(inputs, cfg)?)?;
    let model = FeatureSelector::new(cfg.drop_features.clone()).apply(&features)?;
    let (train, test) = stratified_split(&model, cfg.test_fraction, cfg.seed)?;
    let preprocessor = FittedPreprocessor::fit(&train, cfg.categorical_encoding)?;
    let training = preprocessor.transform(&train, Partition::Training, created_on)?;
    let test = preprocessor.transform(&test, Partition::Test, created_on)?;
    info!(
        training = training.len(),
        test = test.len(),
        columns = training.text_columns.len() + training.value_columns.len(),
        "datasets assembled"
    );
    Ok(DatasetBundle {
        features,
        preprocessor,
        training,
        test,
    })
}
