pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod dedup;
pub mod errors;
pub mod filter;
pub mod history;
pub mod models;
pub mod queue;
pub mod random;
pub mod sampler;
pub mod shuffle;

use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

use catalog::{CatalogProvider, HttpCatalog, MemoryCatalog, StaticToken};
use cli::{Cli, Commands, PlayArgs};
use config::DeepcutConfig;
use database::DatabaseManager;
use dedup::{HistoryStore, MemoryHistory};
use history::SqliteHistory;
use queue::{Discoverer, QueueManager};
use sampler::CatalogSampler;

/// Wire a queue manager from configuration. Recent history is loaded
/// before the first run.
pub async fn build_queue(
    config: &DeepcutConfig,
    catalog: Arc<dyn CatalogProvider>,
    history: Arc<dyn HistoryStore>,
) -> errors::Result<QueueManager> {
    let sampler = CatalogSampler::new(catalog, config.sampler.clone(), config.language.clone());
    let mut discoverer = Discoverer::new(
        sampler,
        config.constraints.clone(),
        history.clone(),
        config.queue.history_cap,
    )
    .with_exclude_recent(config.queue.exclude_recent);
    discoverer.load_history().await?;
    Ok(QueueManager::new(discoverer, history, config.queue.clone()))
}

async fn open_sqlite_history(path: &Path) -> errors::Result<Arc<SqliteHistory>> {
    let db = DatabaseManager::open(path).await?;
    Ok(Arc::new(SqliteHistory::new(db.pool)))
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DeepcutConfig::load_from(path)?,
        None => DeepcutConfig::load()?,
    };

    match cli.command {
        Commands::Play(args) => {
            args.apply(&mut config);
            config.validate()?;
            play(&config, &args).await
        }
        Commands::History {
            recent,
            prune,
            clear,
            history_db,
        } => {
            let path = history_db
                .or_else(|| config.history_db.clone())
                .unwrap_or_else(config::get_default_history_path);
            let history = open_sqlite_history(&path).await?;
            if clear {
                history.clear().await?;
            }
            if let Some(cap) = prune {
                let removed = history.prune(cap).await?;
                println!("Removed {} rows", removed);
            }
            let ids = history.recent_ids(recent).await?;
            println!("{} entries in {:?}", history.count().await?, path);
            for (i, id) in ids.iter().enumerate() {
                println!("{:>3}. {}", i + 1, id);
            }
            Ok(())
        }
        Commands::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = cli.config.unwrap_or_else(config::get_config_file_path);
                config.save_to(&path)?;
                println!("Saved to {:?}", path);
            }
            Ok(())
        }
    }
}

async fn play(config: &DeepcutConfig, args: &PlayArgs) -> anyhow::Result<()> {
    let catalog: Arc<dyn CatalogProvider> = match &args.catalog_file {
        Some(path) => Arc::new(MemoryCatalog::load(path)?),
        None => {
            let token = args
                .token
                .clone()
                .ok_or_else(|| anyhow!("No access token: set DEEPCUT_TOKEN or pass --catalog-file"))?;
            Arc::new(HttpCatalog::new(
                &config.catalog,
                Arc::new(StaticToken::new(token)),
            )?)
        }
    };

    let sqlite = match &config.history_db {
        Some(path) => Some(open_sqlite_history(path).await?),
        None => None,
    };
    let history: Arc<dyn HistoryStore> = match &sqlite {
        Some(store) => store.clone(),
        None => Arc::new(MemoryHistory::new(config.queue.history_cap)),
    };

    log::info!(
        "Session: policy '{}', {} per run, catalog '{}'",
        config.queue.policy,
        config.queue.target_count,
        catalog.id()
    );

    let mut queue = build_queue(config, catalog, history).await?;
    queue
        .request_more(config.queue.target_count)
        .await
        .context("Initial discovery failed")?;

    for n in 1..=args.count {
        if queue.remaining() == 0 && queue.is_growing() {
            queue.wait_for_growth().await;
        }
        let Some(item) = queue.advance().await else {
            break;
        };
        println!(
            "{:>3}. {} - {} [{}] ({}, pop {})",
            n,
            item.primary_contributor(),
            item.title,
            item.primary_genre(),
            item.release_year()
                .map(|y| y.to_string())
                .unwrap_or_else(|| "----".to_string()),
            item.popularity
        );
    }
    queue.wait_for_growth().await;

    if let Some(store) = sqlite {
        store.prune(config.queue.history_cap).await?;
    }
    Ok(())
}
