use std::time::Duration;

use crate::config::Config;
use crate::pings::PingService;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// How long a ping may sit in REQUESTED before it expires.
    pub ping_ttl: chrono::Duration,
    pub interval: Duration,
    pub batch: i64,
}

impl MaintenanceConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            ping_ttl: chrono::Duration::hours(cfg.ping_ttl_hours.max(1)),
            interval: Duration::from_secs(cfg.maintenance_interval_secs.max(1)),
            batch: 500,
        }
    }
}

/// Expires stale pings until a batch comes back short. Returns the total.
pub async fn run_once(pings: &PingService, cfg: &MaintenanceConfig) -> anyhow::Result<usize> {
    let mut total = 0;
    loop {
        let n = pings.expire_stale(cfg.ping_ttl, cfg.batch).await?;
        total += n;
        if (n as i64) < cfg.batch {
            return Ok(total);
        }
    }
}

/// Runs forever. Errors are logged and the next tick tries again.
pub async fn run(pings: PingService, cfg: MaintenanceConfig) -> anyhow::Result<()> {
    tracing::info!(
        ping_ttl_hours = cfg.ping_ttl.num_hours(),
        interval_secs = cfg.interval.as_secs(),
        "maintenance loop started"
    );

    loop {
        match run_once(&pings, &cfg).await {
            Ok(n) if n > 0 => tracing::info!(expired = n, "expired stale ping requests"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ping expiry failed"),
        }

        tokio::time::sleep(cfg.interval).await;
    }
}
