use chrono::Duration;
use serial_test::serial;

mod common;
use common::{client, job, reload_job, setup_db, technician, FakeNotifier, ABUJA, LAGOS};

use polymarq::error::ErrorCode;
use polymarq::jobs::JobStatus;
use polymarq::maintenance::{run_once, MaintenanceConfig};
use polymarq::money::decimal_to_f64;
use polymarq::pings::{NewPing, PingStatus, PingService};

#[tokio::test]
#[serial]
async fn fourth_outstanding_request_is_refused() {
    let Some(pool) = setup_db().await else { return };
    let (_fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "chioma", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;

    for i in 0..3 {
        let t = technician(&pool, &format!("tech{i}"), LAGOS).await;
        pings
            .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
            .await
            .unwrap();
    }

    let fourth = technician(&pool, "tech3", LAGOS).await;
    let err = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: fourth.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert!(err.to_string().starts_with("Maximum number of pings reached"));
}

#[tokio::test]
#[serial]
async fn ping_records_distance_and_quote_and_notifies_technician() {
    let Some(pool) = setup_db().await else { return };
    let (fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "emeka", LAGOS).await;
    let t = technician(&pool, "bola", ABUJA).await;
    let j = job(&pool, c.id, "10000", "20000").await;

    let ping = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap();

    assert_eq!(ping.status, PingStatus::Requested);
    assert!((ping.distance_from_client - 526.0).abs() < 2.0, "{}", ping.distance_from_client);
    let price = decimal_to_f64(&ping.price_quote);
    assert!((10_000.0..=20_000.0).contains(&price), "{price}");

    // the single-quotation path moved the cycle on
    assert_eq!(reload_job(&pool, j.id).await.ping_request_cycle, 2);
    assert_eq!(fake.titles_for(t.id), vec!["Job Request".to_string()]);
}

#[tokio::test]
#[serial]
async fn only_the_owner_can_ping_for_a_job() {
    let Some(pool) = setup_db().await else { return };
    let (_fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let owner = client(&pool, "owner", LAGOS).await;
    let other = client(&pool, "other", LAGOS).await;
    let t = technician(&pool, "tech", LAGOS).await;
    let j = job(&pool, owner.id, "10000", "20000").await;

    let err = pings
        .create_ping(&other, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
#[serial]
async fn accepting_binds_the_job_and_expires_every_sibling() {
    let Some(pool) = setup_db().await else { return };
    let (fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 10);

    let c = client(&pool, "ada", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;

    let mut techs = Vec::new();
    let mut sent = Vec::new();
    for i in 0..4 {
        let t = technician(&pool, &format!("t{i}"), LAGOS).await;
        let p = pings
            .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
            .await
            .unwrap();
        techs.push(t);
        sent.push(p);
    }

    let reply = pings
        .respond(&techs[0], sent[0].id, PingStatus::Accepted)
        .await
        .unwrap();
    assert_eq!(reply.ping.status, PingStatus::Accepted);
    assert_eq!(reply.expired_siblings, 3);

    let job = reload_job(&pool, j.id).await;
    assert_eq!(job.technician_id, Some(techs[0].id));
    assert_eq!(job.status, JobStatus::InProgress);

    let accepted: bool = sqlx::query_scalar(
        "SELECT is_accepted FROM job_price_quotations WHERE job_id = $1 AND technician_id = $2",
    )
    .bind(j.id)
    .bind(techs[0].id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(accepted);

    // expired pings are gone as far as technicians are concerned
    let err = pings
        .respond(&techs[1], sent[1].id, PingStatus::Accepted)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    // an accepted ping cannot be moved again
    let err = pings
        .respond(&techs[0], sent[0].id, PingStatus::Declined)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    assert!(fake
        .titles_for(c.id)
        .contains(&"Job Request Accepted".to_string()));
}

#[tokio::test]
#[serial]
async fn repeating_a_status_is_a_conflict() {
    let Some(pool) = setup_db().await else { return };
    let (fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "kemi", LAGOS).await;
    let t = technician(&pool, "tunde", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;
    let p = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap();

    pings.respond(&t, p.id, PingStatus::Declined).await.unwrap();
    let err = pings.respond(&t, p.id, PingStatus::Declined).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(err.to_string(), "Job is already in the desired state.");

    // a declined ping can still be accepted
    let reply = pings.respond(&t, p.id, PingStatus::Accepted).await.unwrap();
    assert_eq!(reply.ping.status, PingStatus::Accepted);
    assert_eq!(
        fake.titles_for(c.id),
        vec!["Job Request Declined".to_string(), "Job Request Accepted".to_string()]
    );
}

#[tokio::test]
#[serial]
async fn technicians_cannot_answer_someone_elses_ping() {
    let Some(pool) = setup_db().await else { return };
    let (_fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "ifeoma", LAGOS).await;
    let t = technician(&pool, "sani", LAGOS).await;
    let intruder = technician(&pool, "intruder", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;
    let p = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap();

    let err = pings
        .respond(&intruder, p.id, PingStatus::Accepted)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
#[serial]
async fn negotiating_recommends_a_band_around_the_median_quote() {
    let Some(pool) = setup_db().await else { return };
    let (fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "yemi", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;
    let t1 = technician(&pool, "n1", LAGOS).await;
    let t2 = technician(&pool, "n2", LAGOS).await;

    let p1 = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t1.id })
        .await
        .unwrap();
    let p2 = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t2.id })
        .await
        .unwrap();

    pings.respond(&t1, p1.id, PingStatus::Declined).await.unwrap();
    let reply = pings.respond(&t2, p2.id, PingStatus::Negotiating).await.unwrap();

    let mut quotes = vec![decimal_to_f64(&p1.price_quote), decimal_to_f64(&p2.price_quote)];
    quotes.sort_by(f64::total_cmp);
    let median = quotes[1];

    let rec = reply.job_price_recommendation.expect("recommendation");
    assert!((rec.min_price - median * 0.9).abs() < 0.011, "{rec:?}");
    assert!((rec.max_price - median * 1.1).abs() < 0.011, "{rec:?}");

    let last = fake.all().pop().unwrap();
    assert_eq!(last.recipient_id, c.id);
    assert_eq!(last.title, "Job Request Negotiated");
}

#[tokio::test]
#[serial]
async fn maintenance_expires_stale_requests_and_tells_the_client() {
    let Some(pool) = setup_db().await else { return };
    let (fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "musa", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;
    let old_tech = technician(&pool, "old", LAGOS).await;
    let new_tech = technician(&pool, "new", LAGOS).await;

    let stale = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: old_tech.id })
        .await
        .unwrap();
    let fresh = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: new_tech.id })
        .await
        .unwrap();

    sqlx::query("UPDATE pings SET created_at = now() - interval '2 days' WHERE id = $1")
        .bind(stale.id)
        .execute(&pool)
        .await
        .unwrap();

    let cfg = MaintenanceConfig {
        ping_ttl: Duration::hours(24),
        interval: std::time::Duration::from_secs(60),
        batch: 10,
    };
    assert_eq!(run_once(&pings, &cfg).await.unwrap(), 1);

    let status = |id: uuid::Uuid| {
        let pool = pool.clone();
        async move {
            sqlx::query_scalar::<_, String>("SELECT status FROM pings WHERE id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap()
        }
    };
    assert_eq!(status(stale.id).await, "EXPIRED");
    assert_eq!(status(fresh.id).await, "REQUESTED");
    assert!(fake
        .titles_for(c.id)
        .contains(&"Job Request Expired".to_string()));

    // nothing left to do on the next tick
    assert_eq!(run_once(&pings, &cfg).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn a_technician_gets_one_live_request_per_job() {
    let Some(pool) = setup_db().await else { return };
    let (_fake, notifier) = FakeNotifier::shared();
    let pings = PingService::new(pool.clone(), notifier, 3);

    let c = client(&pool, "halima", LAGOS).await;
    let t = technician(&pool, "obi", LAGOS).await;
    let j = job(&pool, c.id, "10000", "20000").await;

    let first = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap();
    let err = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    // a declined request still counts; the technician can change their mind on it
    pings.respond(&t, first.id, PingStatus::Declined).await.unwrap();
    let err = pings
        .create_ping(&c, NewPing { job_id: j.id, technician_id: t.id })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pings WHERE job_id = $1")
        .bind(j.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
