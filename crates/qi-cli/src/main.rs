use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qi_core::{RiskThresholds, RiskWeights};
use qi_scrape::snapshot::{read_snapshot, snapshot_file_name, write_snapshot};
use qi_scrape::{scrape_batch, ArchiveStore, ProjectManifest, ReportFetcher, ScrapeConfig};
use qi_store::{
    cluster_stats, find_cluster, load_batch, recompute_risk, ClusterLocks, ClusterStats,
    LoadedCluster,
};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qi-cli")]
#[command(about = "Interconnection study pipeline command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape every report in a manifest into a JSON snapshot.
    Scrape {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Cap the number of documents (for testing).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Load a snapshot into the database and recompute risk scores.
    Load {
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Scrape and load in one go.
    Run {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long, default_value = "output")]
        output: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Recompute risk scores for one existing cluster.
    Risk {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        phase: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Scrape {
            manifest,
            output,
            limit,
        } => {
            scrape(&manifest, &output, limit).await?;
        }
        Commands::Load { snapshot } => {
            load(&snapshot).await?;
        }
        Commands::Run {
            manifest,
            output,
            limit,
        } => {
            let snapshot = scrape(&manifest, &output, limit).await?;
            load(&snapshot).await?;
        }
        Commands::Risk { cluster, phase } => {
            let pool = connect_db().await?;
            let Some(cluster_id) = find_cluster(&pool, &cluster, &phase).await? else {
                bail!("no cluster named {cluster} / {phase}");
            };
            let weights = load_risk_weights()?;
            recompute_risk(&pool, cluster_id, &weights).await?;
            let stats = cluster_stats(&pool, cluster_id, &RiskThresholds::default()).await?;
            print_stats(&cluster, &phase, &stats);
        }
    }

    Ok(())
}

async fn scrape(manifest_path: &Path, output: &Path, limit: Option<usize>) -> Result<PathBuf> {
    let config = ScrapeConfig::from_env();
    let manifest = ProjectManifest::load(manifest_path)?;
    let targets = manifest.scrape_targets(limit);

    let fetcher = Arc::new(ReportFetcher::new(&config)?);
    let archive = Arc::new(ArchiveStore::new(config.archive_dir.clone()));
    let outcome = scrape_batch(fetcher, Some(archive), targets, config.concurrency).await;

    let path = output.join(snapshot_file_name(
        &manifest.cluster,
        &manifest.phase,
        outcome.started_at,
    ));
    write_snapshot(&path, &outcome.reports).await?;
    println!(
        "scrape complete: run_id={} fetched={} failed={} snapshot={}",
        outcome.run_id,
        outcome.fetched,
        outcome.failed,
        path.display()
    );
    Ok(path)
}

async fn load(snapshot_path: &Path) -> Result<()> {
    let pool = connect_db().await?;
    let weights = load_risk_weights()?;
    let reports = read_snapshot(snapshot_path).await?;
    let locks = ClusterLocks::new();

    let summary = load_batch(&pool, &locks, &reports).await?;
    println!(
        "load complete: loaded={} failed={}",
        summary.loaded, summary.failed
    );
    for (project_id, error) in &summary.errors {
        eprintln!("  {project_id}: {error}");
    }

    for loaded in &summary.clusters {
        recompute_risk(&pool, loaded.cluster_id, &weights).await?;
        let stats = cluster_stats(&pool, loaded.cluster_id, &RiskThresholds::default()).await?;
        print_loaded_stats(loaded, &stats);
    }
    Ok(())
}

async fn connect_db() -> Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    PgPool::connect(&database_url)
        .await
        .context("connecting to database")
}

fn load_risk_weights() -> Result<RiskWeights> {
    let Ok(path) = std::env::var("QI_WEIGHTS_FILE") else {
        return Ok(RiskWeights::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let weights: RiskWeights =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))?;
    weights.validate()?;
    Ok(weights)
}

fn print_loaded_stats(loaded: &LoadedCluster, stats: &ClusterStats) {
    print_stats(&loaded.cluster, &loaded.phase, stats);
}

fn print_stats(cluster: &str, phase: &str, stats: &ClusterStats) {
    println!(
        "cluster {cluster} {phase}: projects={} total_mw={:.0} total_cost=${:.0}",
        stats.total_projects, stats.total_mw, stats.total_cost
    );
    if let Some(avg) = stats.avg_cost_per_kw {
        println!("  avg $/kW: {avg:.0}");
    }
    if let Some(avg) = stats.avg_risk {
        println!("  avg risk: {avg:.1}");
    }
    for (level, count) in &stats.distribution {
        println!("  {}: {count}", level.as_str());
    }
}
