use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::pings::model::{Ping, PingStatus};

#[derive(Clone)]
pub struct PingsRepo {
    pool: PgPool,
}

impl PingsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Reads
    // ----------------------------

    /// Any ping that has not expired.
    pub async fn get_open(&self, ping_id: Uuid) -> anyhow::Result<Option<Ping>> {
        let ping = sqlx::query_as::<_, Ping>("SELECT * FROM pings WHERE id = $1 AND status <> $2")
            .bind(ping_id)
            .bind(PingStatus::Expired.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(ping)
    }

    pub async fn list_requested_for_technician(
        &self,
        technician_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Ping>> {
        let rows = sqlx::query_as::<_, Ping>(
            r#"
            SELECT * FROM pings
            WHERE technician_id = $1 AND status = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(technician_id)
        .bind(PingStatus::Requested.as_str())
        .bind(limit.clamp(1, 200))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_requested_for_technician(&self, technician_id: Uuid) -> anyhow::Result<i64> {
        let n: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pings WHERE technician_id = $1 AND status = $2")
                .bind(technician_id)
                .bind(PingStatus::Requested.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(n)
    }

    // ----------------------------
    // Maintenance
    // ----------------------------

    /// Expires `Requested` pings created before `cutoff`, returning them.
    pub async fn expire_requested_before(
        &self,
        cutoff: DateTime<Utc>,
        batch: i64,
    ) -> anyhow::Result<Vec<Ping>> {
        let rows = sqlx::query_as::<_, Ping>(
            r#"
            WITH stale AS (
                SELECT id FROM pings
                WHERE status = $1 AND created_at < $2
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $3
            )
            UPDATE pings p
            SET status = $4, updated_at = now()
            FROM stale
            WHERE p.id = stale.id
            RETURNING p.*
            "#,
        )
        .bind(PingStatus::Requested.as_str())
        .bind(cutoff)
        .bind(batch)
        .bind(PingStatus::Expired.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ----------------------------
    // Transaction-scoped helpers
    // ----------------------------

    /// Whether the technician already holds a live ping for the job.
    pub async fn exists_live_for_technician(
        conn: &mut PgConnection,
        job_id: Uuid,
        technician_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM pings
                WHERE job_id = $1 AND technician_id = $2 AND status <> $3
            )
            "#,
        )
        .bind(job_id)
        .bind(technician_id)
        .bind(PingStatus::Expired.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(found)
    }

    pub async fn count_requested_for_client(
        conn: &mut PgConnection,
        client_id: Uuid,
    ) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pings WHERE client_id = $1 AND status = $2")
            .bind(client_id)
            .bind(PingStatus::Requested.as_str())
            .fetch_one(&mut *conn)
            .await?;
        Ok(n)
    }

    pub async fn insert(
        conn: &mut PgConnection,
        job_id: Uuid,
        technician_id: Uuid,
        client_id: Uuid,
        distance_from_client: f64,
        price_quote: &BigDecimal,
        currency: &str,
    ) -> anyhow::Result<Ping> {
        let ping = sqlx::query_as::<_, Ping>(
            r#"
            INSERT INTO pings (
                job_id, technician_id, client_id, distance_from_client,
                status, price_quote, currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(technician_id)
        .bind(client_id)
        .bind(distance_from_client)
        .bind(PingStatus::Requested.as_str())
        .bind(price_quote.round(2))
        .bind(currency)
        .fetch_one(&mut *conn)
        .await?;
        Ok(ping)
    }

    /// Row-locks a non-expired ping. Take the job lock first.
    pub async fn lock_open(conn: &mut PgConnection, ping_id: Uuid) -> anyhow::Result<Option<Ping>> {
        let ping = sqlx::query_as::<_, Ping>(
            "SELECT * FROM pings WHERE id = $1 AND status <> $2 FOR UPDATE",
        )
        .bind(ping_id)
        .bind(PingStatus::Expired.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(ping)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        ping_id: Uuid,
        status: PingStatus,
    ) -> anyhow::Result<Ping> {
        let ping = sqlx::query_as::<_, Ping>(
            r#"
            UPDATE pings
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ping_id)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(ping)
    }

    /// Expires every other ping on the job. Returns how many moved.
    pub async fn expire_siblings(
        conn: &mut PgConnection,
        job_id: Uuid,
        keep_ping_id: Uuid,
    ) -> anyhow::Result<u64> {
        let n = sqlx::query(
            r#"
            UPDATE pings
            SET status = $3, updated_at = now()
            WHERE job_id = $1 AND id <> $2 AND status <> $3
            "#,
        )
        .bind(job_id)
        .bind(keep_ping_id)
        .bind(PingStatus::Expired.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(n)
    }

    pub async fn accepted_for_job(
        conn: &mut PgConnection,
        job_id: Uuid,
    ) -> anyhow::Result<Option<Ping>> {
        let ping = sqlx::query_as::<_, Ping>("SELECT * FROM pings WHERE job_id = $1 AND status = $2")
            .bind(job_id)
            .bind(PingStatus::Accepted.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(ping)
    }

    /// Oldest first.
    pub async fn for_job(
        conn: &mut PgConnection,
        job_id: Uuid,
        statuses: &[PingStatus],
    ) -> anyhow::Result<Vec<Ping>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let rows = sqlx::query_as::<_, Ping>(
            r#"
            SELECT * FROM pings
            WHERE job_id = $1 AND status = ANY($2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(job_id)
        .bind(statuses)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Quotes of technicians who declined or are negotiating the job.
    pub async fn negotiation_quotes(
        conn: &mut PgConnection,
        job_id: Uuid,
    ) -> anyhow::Result<Vec<BigDecimal>> {
        let rows: Vec<BigDecimal> = sqlx::query_scalar(
            r#"
            SELECT price_quote FROM pings
            WHERE job_id = $1 AND status IN ($2, $3)
            "#,
        )
        .bind(job_id)
        .bind(PingStatus::Declined.as_str())
        .bind(PingStatus::Negotiating.as_str())
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn set_transaction_cost(
        conn: &mut PgConnection,
        ping_id: Uuid,
        cost: &BigDecimal,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE pings SET transaction_cost = $2, updated_at = now() WHERE id = $1")
            .bind(ping_id)
            .bind(cost.round(2))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
