use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::Config;

pub async fn make_pool(cfg: &Config) -> anyhow::Result<PgPool> {
    let max_connections = cfg.db_max_connections.clamp(1, 64);
    let acquire_timeout_secs = cfg.db_acquire_timeout_secs.clamp(1, 60);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(&cfg.database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Row offset of a 1-based page. Out-of-range pages clamp instead of overflowing.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    page.max(1).saturating_sub(1).saturating_mul(limit.max(0))
}
