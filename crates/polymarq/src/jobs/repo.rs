use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::jobs::model::{Job, JobFilter, JobScope, JobStatus, JobUpdate, NewJob, SortOrder};
use crate::money::DEFAULT_CURRENCY;

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Writes
    // ----------------------------

    pub async fn create(&self, client_id: Uuid, job: NewJob) -> anyhow::Result<Job> {
        let currency = job
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
            .to_uppercase();

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                client_id, name, description, location_address, status,
                min_price, max_price, currency, duration,
                require_technicians_immediately, require_technicians_next_day
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(job.name.trim())
        .bind(job.description.trim())
        .bind(job.location_address.trim())
        .bind(JobStatus::Pending.as_str())
        .bind(job.min_price.round(2))
        .bind(job.max_price.round(2))
        .bind(currency)
        .bind(job.duration)
        .bind(job.require_technicians_immediately)
        .bind(job.require_technicians_next_day)
        .fetch_one(&self.pool)
        .await?;

        Ok(job)
    }

    /// Applies the non-null fields of `update`. Returns `None` if the job is gone.
    pub async fn update(&self, job_id: Uuid, update: JobUpdate) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                location_address = COALESCE($4, location_address),
                min_price = COALESCE($5, min_price),
                max_price = COALESCE($6, max_price),
                duration = COALESCE($7, duration),
                require_technicians_immediately = COALESCE($8, require_technicians_immediately),
                require_technicians_next_day = COALESCE($9, require_technicians_next_day),
                updated_at = now()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.location_address)
        .bind(update.min_price.map(|p| p.round(2)))
        .bind(update.max_price.map(|p| p.round(2)))
        .bind(update.duration)
        .bind(update.require_technicians_immediately)
        .bind(update.require_technicians_next_day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn soft_delete(&self, job_id: Uuid) -> anyhow::Result<bool> {
        let n = sqlx::query(
            r#"
            UPDATE jobs
            SET is_deleted = TRUE, updated_at = now()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(n == 1)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Cursor-paginated listing. Cursor is (updated_at, id) in the requested order.
    pub async fn list(
        &self,
        scope: JobScope,
        filter: &JobFilter,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<Job>> {
        let limit = limit.clamp(1, 200);

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT j.* FROM jobs j JOIN users u ON u.id = j.client_id WHERE j.is_deleted = FALSE",
        );

        match scope {
            JobScope::Client(id) => {
                qb.push(" AND j.client_id = ").push_bind(id);
            }
            JobScope::Technician(id) => {
                qb.push(" AND j.technician_id = ").push_bind(id);
            }
            JobScope::Open => {
                qb.push(" AND j.technician_id IS NULL");
            }
        }

        if let Some(name) = filter.name.as_deref() {
            qb.push(" AND j.name ILIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(username) = filter.client_username.as_deref() {
            qb.push(" AND u.username ILIKE ").push_bind(format!("%{username}%"));
        }
        if let Some(duration) = filter.duration {
            qb.push(" AND j.duration = ").push_bind(duration);
        }
        if filter.min_price.is_some() || filter.max_price.is_some() {
            let currency = filter
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
            qb.push(" AND j.currency = ").push_bind(currency);
        }
        if let Some(min) = filter.min_price.clone() {
            qb.push(" AND j.min_price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price.clone() {
            qb.push(" AND j.max_price <= ").push_bind(max);
        }
        if let Some(immediate) = filter.require_technicians_immediately {
            qb.push(" AND j.require_technicians_immediately = ")
                .push_bind(immediate);
        }

        let (cmp, dir) = match filter.order {
            SortOrder::Asc => (">", "ASC"),
            SortOrder::Desc => ("<", "DESC"),
        };

        if let Some((updated_at, id)) = cursor {
            qb.push(" AND (j.updated_at, j.id) ")
                .push(cmp)
                .push(" (")
                .push_bind(updated_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }

        qb.push(format!(" ORDER BY j.updated_at {dir}, j.id {dir} LIMIT "))
            .push_bind(limit);

        let rows = qb.build_query_as::<Job>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    // ----------------------------
    // Transaction-scoped helpers
    // ----------------------------

    /// Row-locks the job until the surrounding transaction ends.
    /// Every multi-entity write on a job goes through this first.
    pub async fn lock(conn: &mut PgConnection, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE id = $1 AND is_deleted = FALSE FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(job)
    }

    pub async fn bump_ping_cycle(conn: &mut PgConnection, job_id: Uuid) -> anyhow::Result<i32> {
        let cycle: i32 = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET ping_request_cycle = ping_request_cycle + 1, updated_at = now()
            WHERE id = $1
            RETURNING ping_request_cycle
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(cycle)
    }

    pub async fn bind_technician(
        conn: &mut PgConnection,
        job_id: Uuid,
        technician_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET technician_id = $2, status = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(technician_id)
        .bind(JobStatus::InProgress.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn set_completion(
        conn: &mut PgConnection,
        job_id: Uuid,
        completion_state: &BigDecimal,
        status: JobStatus,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET completion_state = $2, status = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(completion_state.round(2))
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
