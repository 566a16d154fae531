use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use laliga_features::PipelineConfig;
use laliga_features::dataset::Encoding;
use laliga_features::export::{PREPROCESSOR_FILE, read_partition_summary, write_dataset};
use laliga_features::pipeline::build_datasets;
use laliga_features::{store, tables};

/// Builds the training and test feature partitions from scraped league tables.
#[derive(Debug, Parser)]
#[command(name = "laliga_features", version)]
struct Args {
    /// Directory holding results.csv and the three *_ranking.csv files.
    #[arg(long, conflicts_with = "db")]
    csv_dir: Option<PathBuf>,

    /// SQLite store filled by the `ingest` binary.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Pipeline config (JSON). Falls back to LALIGA_FEATURES_CONFIG, then defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory. Overrides the config's data_dir.
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    test_fraction: Option<f64>,

    /// Leave categorical columns as strings instead of one-hot encoding them.
    #[arg(long)]
    passthrough: bool,

    /// Extract features with rayon.
    #[arg(long)]
    parallel: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::from_env()?,
    };
    if let Some(out) = args.out {
        cfg.data_dir = out;
    }
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    if let Some(f) = args.test_fraction {
        cfg.test_fraction = f;
    }
    if args.passthrough {
        cfg.categorical_encoding = Encoding::Passthrough;
    }
    cfg.parallel |= args.parallel;

    let inputs = match (&args.csv_dir, &args.db) {
        (Some(dir), _) => tables::read_inputs(dir)?,
        (None, Some(db)) => store::load_inputs(&store::open_db(db)?)?,
        (None, None) => return Err(anyhow!("pass --csv-dir or --db")),
    };
    info!(
        results = inputs.results.len(),
        general = inputs.general.len(),
        home = inputs.home.len(),
        away = inputs.away.len(),
        "inputs loaded"
    );

    let created_on = Utc::now().date_naive();
    let bundle = build_datasets(&inputs, &cfg, created_on).context("build datasets")?;

    let written = write_dataset(
        &cfg.data_dir,
        &bundle.training,
        &bundle.test,
        &bundle.preprocessor,
    )?;

    println!("Feature build complete");
    println!("Matches: {}", bundle.features.len());
    for path in written.iter().filter(|p| p.extension().is_some_and(|e| e == "parquet")) {
        let summary = read_partition_summary(path)?;
        println!(
            "{}: rows={} columns={}",
            path.display(),
            summary.len(),
            summary.columns.len()
        );
    }
    println!("Preprocessor: {}", cfg.data_dir.join(PREPROCESSOR_FILE).display());
    println!("Fingerprint: {}", bundle.preprocessor.fingerprint);
    Ok(())
}
