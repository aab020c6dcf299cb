use std::env;
use std::str::FromStr;

use anyhow::Context;
use bigdecimal::BigDecimal;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use polymarq::jobs::{JobsRepo, NewJob};
use polymarq::money::decimal_to_f64;
use polymarq::payments::{JobState, PaymentsRepo};
use polymarq::pings::PingsRepo;
use polymarq::users::{NewUser, UsersRepo};

// Technicians are scattered around this point (Lagos Island).
const ORIGIN: (f64, f64) = (6.4541, 3.3947);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "polymarqctl <command>\n\
             Commands:\n\
             - reset\n\
             - seed <technicians>\n\
             - demo\n\
             - job-state <job_id>\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let _ = dotenvy::dotenv();
    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .context("DATABASE_URL or TEST_DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    match args[1].as_str() {
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
            seed(&pool, n).await?;
        }
        "demo" => {
            reset(&pool).await?;
            seed(&pool, 3).await?;
            show_counts(&pool).await?;
        }
        "job-state" => {
            let id = args
                .get(2)
                .context("usage: polymarqctl job-state <job_id>")?;
            let job_id: Uuid = id.parse()?;
            print_job_state(&pool, job_id).await?;
        }
        other => {
            eprintln!("Unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            notifications,
            technician_bank_accounts,
            job_initial_payments,
            job_incremental_payments,
            job_price_quotations,
            pings,
            jobs,
            users
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(pool)
    .await?;

    println!("reset OK");
    Ok(())
}

async fn seed(pool: &PgPool, technicians: usize) -> anyhow::Result<()> {
    let users = UsersRepo::new(pool.clone());
    let jobs = JobsRepo::new(pool.clone());
    let suffix = &Uuid::new_v4().simple().to_string()[..8];

    let client = users
        .create(NewUser {
            username: format!("client-{suffix}"),
            email: format!("client-{suffix}@example.com"),
            full_name: "Demo Client".into(),
            is_client: true,
            is_technician: false,
            latitude: Some(ORIGIN.0),
            longitude: Some(ORIGIN.1),
        })
        .await?;
    println!("+ client {} token={}", client.id, client.api_token);

    for i in 0..technicians {
        // roughly 1.1 km further out per technician
        let offset = 0.01 * (i as f64 + 1.0);
        let tech = users
            .create(NewUser {
                username: format!("tech-{suffix}-{i}"),
                email: format!("tech-{suffix}-{i}@example.com"),
                full_name: format!("Demo Technician {i}"),
                is_client: false,
                is_technician: true,
                latitude: Some(ORIGIN.0 + offset),
                longitude: Some(ORIGIN.1 + offset),
            })
            .await?;
        println!("+ technician {} token={}", tech.id, tech.api_token);
    }

    let job = jobs
        .create(
            client.id,
            NewJob {
                name: "Fix kitchen sink".into(),
                description: "Leaking pipe under the sink".into(),
                location_address: "12 Marina Road, Lagos".into(),
                min_price: BigDecimal::from_str("15000")?,
                max_price: BigDecimal::from_str("30000")?,
                currency: None,
                duration: 2,
                require_technicians_immediately: false,
                require_technicians_next_day: false,
            },
        )
        .await?;
    println!("+ job {} ({})", job.id, job.name);

    Ok(())
}

async fn show_counts(pool: &PgPool) -> anyhow::Result<()> {
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;
    let pings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pings")
        .fetch_one(pool)
        .await?;

    println!("users={users} jobs={jobs} pings={pings}");
    Ok(())
}

async fn print_job_state(pool: &PgPool, job_id: Uuid) -> anyhow::Result<()> {
    let jobs = JobsRepo::new(pool.clone());
    let payments = PaymentsRepo::new(pool.clone());

    let job = jobs
        .get(job_id)
        .await?
        .with_context(|| format!("job {job_id} not found"))?;

    println!(
        "job {} status={} completion_state={} cycle={}",
        job.id,
        job.status.as_str(),
        job.completion_state,
        job.ping_request_cycle
    );

    let mut conn = pool.acquire().await?;
    let Some(ping) = PingsRepo::accepted_for_job(&mut conn, job.id).await? else {
        println!("no accepted ping yet");
        return Ok(());
    };
    let paid = PaymentsRepo::paid_total(&mut conn, job.id).await?;

    let state = JobState {
        price_quote: decimal_to_f64(&ping.price_quote),
        transaction_cost: ping.transaction_cost.as_ref().map(decimal_to_f64).unwrap_or(0.0),
        total_amount_paid: decimal_to_f64(&paid),
        completion_state: job.completion(),
    };

    println!(
        "technician={} quote={} cost={} payable={:.2} paid={:.2} balance_due={:.2}",
        ping.technician_id,
        ping.price_quote,
        ping.transaction_cost
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "not yet computed".into()),
        state.total_payable_amount(),
        state.total_amount_paid,
        state.total_balance_due()
    );

    for p in payments.list_paid(job.id).await? {
        println!(
            "  {} client={} technician={} amount={} ref={}",
            p.created_at.to_rfc3339(),
            p.client_state,
            p.technician_state,
            p.amount,
            p.transaction_reference.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}
