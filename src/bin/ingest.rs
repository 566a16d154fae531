use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use laliga_features::records::Scope;
use laliga_features::roles::RoundFlip;
use laliga_features::{PipelineConfig, store, tables};

/// Loads scraped CSV tables into the SQLite store.
#[derive(Debug, Parser)]
#[command(name = "ingest", version)]
struct Args {
    /// Target database; created when missing.
    #[arg(long, default_value = "data/laliga.sqlite")]
    db: PathBuf,

    /// Directory holding results.csv and the three *_ranking.csv files.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Raw fixtures (home_team, away_team, goals) to resolve into results.
    #[arg(long)]
    fixtures: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = PipelineConfig::from_env()?;
    let mut conn = store::open_db(&args.db)?;

    let mut results = 0usize;
    let mut snapshots = 0usize;
    if let Some(dir) = &args.csv_dir {
        let inputs = tables::read_inputs(dir)?;
        results += store::insert_results(&mut conn, &inputs.results)?;
        for scope in Scope::ALL {
            snapshots += store::insert_snapshots(&mut conn, scope, inputs.series(scope))?;
        }
    }
    if let Some(path) = &args.fixtures {
        let fixtures = tables::read_fixtures_csv(path)?;
        let flip = RoundFlip::new(cfg.second_leg_start);
        results += store::insert_fixtures(&mut conn, &fixtures, &flip)?;
    }

    println!("Ingest complete");
    println!("DB: {}", args.db.display());
    println!("Results upserted: {results}");
    println!("Snapshots upserted: {snapshots}");
    Ok(())
}
