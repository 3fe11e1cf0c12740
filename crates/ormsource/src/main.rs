use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ormsource::config::Config;
use ormsource::datasource::{default_cache, CacheOptions, DataSourceInit, OrmDataSource};
use ormsource::storage::InMemoryConnection;
use ormsource_core::cache::Cache;
use ormsource_core::orm::{Entity, FindOptions, RemoveOptions, SaveOptions};

/// ormsource - Exercise the cache-aside data source against an in-memory ORM
#[derive(Parser, Debug)]
#[command(name = "ormsource")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of authors to seed
    #[arg(long, short, default_value = "100", env = "PROBE_ENTITIES")]
    entities: u64,

    /// Number of simulated requests
    #[arg(long, short, default_value = "50", env = "PROBE_ROUNDS")]
    rounds: usize,

    /// Ids looked up per request
    #[arg(long, short, default_value = "10", env = "PROBE_BATCH")]
    batch: usize,

    /// Cache TTL in milliseconds, overrides CACHE_TTL_MILLISECONDS
    #[arg(long, env = "PROBE_TTL_MS")]
    ttl_ms: Option<u64>,

    /// Disable caching, overrides CACHE_ENABLED
    #[arg(long, env = "PROBE_NO_CACHE")]
    no_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    name: String,
}

impl Entity for Author {
    type Id = u64;
    const REPOSITORY: &'static str = "author";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn assign_generated_id(&mut self, seq: u64) {
        self.id = Some(seq);
    }
}

/// Per-request context handed to each data source.
#[derive(Debug)]
struct RequestContext {
    request_id: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ormsource=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    anyhow::ensure!(cli.entities > 0, "--entities must be greater than 0");

    let mut config = Config::from_env();
    if cli.no_cache {
        config.cache_enabled = false;
    }
    if let Some(ttl_ms) = cli.ttl_ms {
        config.cache_ttl_milliseconds = ttl_ms;
    }
    let cache_options: Option<CacheOptions> = config.cache_options();
    let cache = default_cache(&config);

    tracing::info!(
        cache_enabled = config.cache_enabled,
        ttl_ms = config.cache_ttl().as_millis() as u64,
        max_entries = config.cache_max_entries,
        "Starting probe"
    );

    let orm = Arc::new(InMemoryConnection::new());
    seed(&orm, cli.entities).await?;

    let started = Instant::now();
    let mut rng = rand::rng();
    let mut resolved = 0usize;
    let mut unresolved = 0usize;

    for request_id in 0..cli.rounds {
        let mut source = OrmDataSource::new(Arc::clone(&orm), cache_options);
        source.initialize(
            DataSourceInit::new(RequestContext { request_id }).with_cache(Arc::clone(&cache)),
        );

        let ids: Vec<u64> = (0..cli.batch)
            .map(|_| rng.random_range(1..=cli.entities))
            .collect();
        let authors = source
            .find_many_by_ids::<Author>(&ids, &FindOptions::default())
            .await
            .with_context(|| format!("request {request_id} failed"))?;

        let found = authors.iter().flatten().count();
        resolved += found;
        unresolved += authors.len() - found;
        tracing::trace!(
            request_id = source.context().map(|ctx| ctx.request_id),
            requested = ids.len(),
            found,
            "Request served"
        );
    }

    let stats = orm.stats();
    let lookups = cli.rounds * cli.batch;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        lookups,
        resolved,
        unresolved,
        orm_find_one = stats.find_one,
        orm_find_by_ids = stats.find_by_ids,
        cache_hits = lookups.saturating_sub(stats.find_one),
        "Probe finished"
    );

    churn(&orm, cache_options, &cache).await?;

    Ok(())
}

async fn seed(orm: &Arc<InMemoryConnection>, entities: u64) -> Result<()> {
    let mut source: OrmDataSource<InMemoryConnection> = OrmDataSource::new(Arc::clone(orm), None);
    source.initialize(DataSourceInit::new(()));

    for n in 1..=entities {
        let author = Author {
            id: None,
            name: format!("Author {n}"),
        };
        source.save_one(author, &SaveOptions::default()).await?;
    }

    tracing::debug!(count = orm.count::<Author>().await, "Seeded authors");
    Ok(())
}

/// Writes through one data source and shows that a cached read stays stale
/// until its entry expires.
async fn churn(
    orm: &Arc<InMemoryConnection>,
    cache_options: Option<CacheOptions>,
    cache: &Arc<dyn Cache>,
) -> Result<()> {
    let mut source = OrmDataSource::new(Arc::clone(orm), cache_options);
    source.initialize(DataSourceInit::new(()).with_cache(Arc::clone(cache)));

    let saved = source
        .save_one(
            Author {
                id: None,
                name: "Ephemeral".to_string(),
            },
            &SaveOptions::default(),
        )
        .await?;
    let id = saved.id.context("saved author has no id")?;

    source.find_one::<Author>(&id, &FindOptions::default()).await?;
    source.remove_one(saved, &RemoveOptions::default()).await?;
    let after_remove = source
        .find_one::<Author>(&id, &FindOptions::default())
        .await?;

    tracing::info!(
        id,
        cached = source.cache_enabled(),
        visible_after_remove = after_remove.is_some(),
        "Write churn finished"
    );
    Ok(())
}
