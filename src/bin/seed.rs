use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marquee::{
    config::Config,
    db::{create_pool, run_migrations, PgRepository},
    services::{providers::TmdbSource, seed::seed_catalog},
};

/// Imports TMDB genres and popular movies into the database
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("marquee=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let api_key = config
        .tmdb_api_key
        .clone()
        .context("TMDB_API_KEY must be set to seed the catalog")?;

    let pool = create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to the database")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let source = TmdbSource::new(api_key, config.tmdb_api_url.clone());
    let repo = PgRepository::new(pool);

    let report = seed_catalog(&source, &repo, config.seed_pages).await?;

    tracing::info!(
        genres = report.genres,
        inserted = report.inserted,
        existing = report.existing,
        skipped = report.skipped,
        "Catalog seeded"
    );

    Ok(())
}
