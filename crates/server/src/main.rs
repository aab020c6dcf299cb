use std::sync::Arc;

use polymarq::api;
use polymarq::config;
use polymarq::db;
use polymarq::jobs::JobsRepo;
use polymarq::maintenance::{self, MaintenanceConfig};
use polymarq::notifications::{NotificationsRepo, PgNotifier, SharedNotifier};
use polymarq::payments::{JobPaymentService, PaystackClient, SharedGateway};
use polymarq::pings::PingService;
use polymarq::pricing::TechnicianSearch;
use polymarq::users::UsersRepo;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("POLYMARQ_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("polymarq=info,server=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = config::Config::from_env()?;
    let api_addr = cfg.api_addr.clone();
    let maintenance_cfg = MaintenanceConfig::from_config(&cfg);

    tracing::info!(
        api = api_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        max_requested_pings = cfg.max_requested_pings,
        ping_ttl_hours = cfg.ping_ttl_hours,
        maintenance_interval_secs = cfg.maintenance_interval_secs,
        paystack_base_url = %cfg.paystack.base_url,
        "polymarq starting"
    );

    let pool = db::make_pool(&cfg).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let notifications = NotificationsRepo::new(pool.clone());
    let notifier: SharedNotifier = Arc::new(PgNotifier::new(notifications.clone()));
    let gateway: SharedGateway = Arc::new(PaystackClient::new(&cfg.paystack)?);

    let pings = PingService::new(pool.clone(), notifier.clone(), cfg.max_requested_pings);

    // ---- API task ----
    let api_state = api::ApiState {
        users: UsersRepo::new(pool.clone()),
        jobs: JobsRepo::new(pool.clone()),
        pings: pings.clone(),
        search: TechnicianSearch::new(pool.clone()),
        payments: JobPaymentService::new(
            pool.clone(),
            gateway,
            notifier,
            cfg.paystack.secret_key.clone(),
        ),
        notifications,
        default_page_size: cfg.default_page_size,
    };
    let app = api::router(api_state);

    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, "api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    // ---- Maintenance task ----
    let maintenance_handle = tokio::spawn(maintenance::run(pings, maintenance_cfg));

    tokio::select! {
        res = api_handle => res??,
        res = maintenance_handle => res??,
    }

    Ok(())
}
