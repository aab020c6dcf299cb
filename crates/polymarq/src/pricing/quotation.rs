use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::MarketError;
use crate::jobs::{Job, JobsRepo};
use crate::money::{decimal_from_f64, decimal_to_f64};
use crate::pricing::budget::resolve_budget_range;
use crate::pricing::sampler::{sample_unique_uniform, SampleError};

pub const PRICE_PRECISION: u32 = 2;

/// Price offered to one technician for one job.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Quotation {
    pub id: Uuid,
    pub job_id: Uuid,
    pub technician_id: Uuid,
    pub price: BigDecimal,
    pub currency: String,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pairs each technician with one sampled price, by position.
pub fn price_technicians(
    rng: &mut impl Rng,
    job: &Job,
    technicians: &[Uuid],
) -> Result<Vec<(Uuid, f64)>, SampleError> {
    let (low, high) = resolve_budget_range(job);
    let prices = sample_unique_uniform(
        rng,
        decimal_to_f64(&low),
        decimal_to_f64(&high),
        technicians.len(),
        PRICE_PRECISION,
    )?;

    Ok(technicians.iter().copied().zip(prices).collect())
}

fn sample_error(e: SampleError) -> MarketError {
    match e {
        SampleError::Exhausted { .. } => MarketError::Internal(e.into()),
        _ => MarketError::validation("Budget range too narrow", vec![e.to_string()]),
    }
}

pub struct QuotationsRepo;

impl QuotationsRepo {
    pub async fn get(
        conn: &mut PgConnection,
        job_id: Uuid,
        technician_id: Uuid,
    ) -> anyhow::Result<Option<Quotation>> {
        let row = sqlx::query_as::<_, Quotation>(
            "SELECT * FROM job_price_quotations WHERE job_id = $1 AND technician_id = $2",
        )
        .bind(job_id)
        .bind(technician_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Inserts or re-prices quotations for the job in a single statement.
    pub async fn upsert_batch(
        conn: &mut PgConnection,
        job_id: Uuid,
        currency: &str,
        prices: &[(Uuid, BigDecimal)],
    ) -> anyhow::Result<Vec<Quotation>> {
        if prices.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO job_price_quotations (job_id, technician_id, price, currency) ",
        );
        qb.push_values(prices, |mut row, (technician_id, price)| {
            row.push_bind(job_id)
                .push_bind(*technician_id)
                .push_bind(price.clone())
                .push_bind(currency.to_string());
        });
        qb.push(
            r#"
            ON CONFLICT (technician_id, job_id) DO UPDATE
            SET price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                is_accepted = FALSE,
                updated_at = now()
            RETURNING *
            "#,
        );

        let rows = qb
            .build_query_as::<Quotation>()
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    pub async fn mark_accepted(
        conn: &mut PgConnection,
        job_id: Uuid,
        technician_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE job_price_quotations
            SET is_accepted = TRUE, updated_at = now()
            WHERE job_id = $1 AND technician_id = $2
            "#,
        )
        .bind(job_id)
        .bind(technician_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Prices `technicians` for `job` and advances its ping cycle.
///
/// The caller must hold the job row lock. Quotations are written before the
/// cycle bump in the same transaction, so nobody observes a bumped cycle
/// without its quotations. The cycle moves by one however many technicians
/// were priced. Results follow the order of `technicians`.
pub async fn quote_in_tx(
    conn: &mut PgConnection,
    job: &Job,
    technicians: &[Uuid],
) -> Result<Vec<Quotation>, MarketError> {
    let priced = {
        let mut rng = StdRng::from_entropy();
        price_technicians(&mut rng, job, technicians).map_err(sample_error)?
    };

    let mut prices = Vec::with_capacity(priced.len());
    for (technician_id, price) in priced {
        let price = decimal_from_f64(price).map_err(|e| MarketError::Internal(e.into()))?;
        prices.push((technician_id, price));
    }

    let mut rows = QuotationsRepo::upsert_batch(conn, job.id, &job.currency, &prices).await?;
    rows.sort_by_key(|q| technicians.iter().position(|t| *t == q.technician_id));

    let cycle = JobsRepo::bump_ping_cycle(conn, job.id).await?;

    tracing::info!(
        job_id = %job.id,
        quoted = rows.len(),
        ping_request_cycle = cycle,
        "generated price quotations"
    );

    Ok(rows)
}

#[derive(Clone)]
pub struct QuotationGenerator {
    pool: PgPool,
}

impl QuotationGenerator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn generate_quotations(
        &self,
        job_id: Uuid,
        technicians: &[Uuid],
    ) -> Result<Vec<Quotation>, MarketError> {
        let mut tx = self.pool.begin().await?;

        let job = JobsRepo::lock(&mut tx, job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;

        let rows = quote_in_tx(&mut tx, &job, technicians).await?;

        tx.commit().await?;
        Ok(rows)
    }

    pub async fn generate_single_quotation(
        &self,
        job_id: Uuid,
        technician_id: Uuid,
    ) -> Result<Quotation, MarketError> {
        self.generate_quotations(job_id, &[technician_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::Internal(anyhow::anyhow!("quotation upsert returned no row")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::budget::tests::job;

    #[test]
    fn every_technician_gets_a_distinct_price_inside_the_band() {
        let mut rng = StdRng::seed_from_u64(11);
        let j = job("1000", "2000", 3);
        let techs: Vec<Uuid> = (0..25).map(|_| Uuid::new_v4()).collect();

        let priced = price_technicians(&mut rng, &j, &techs).unwrap();

        assert_eq!(priced.len(), techs.len());
        for ((tech, price), expected) in priced.iter().zip(&techs) {
            assert_eq!(tech, expected);
            // cycle 3 lifts the floor to 1300
            assert!((1300.0..=2000.0).contains(price), "{price}");
        }
        let mut prices: Vec<i64> = priced.iter().map(|(_, p)| (p * 100.0).round() as i64).collect();
        prices.sort_unstable();
        prices.dedup();
        assert_eq!(prices.len(), techs.len());
    }

    #[test]
    fn band_too_narrow_for_the_crowd_is_a_validation_error() {
        let mut rng = StdRng::seed_from_u64(11);
        let j = job("100", "100.02", 1);
        let techs: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        let err = price_technicians(&mut rng, &j, &techs).unwrap_err();
        assert!(matches!(err, SampleError::RangeTooNarrow { count: 4, .. }));
        assert_eq!(sample_error(err).code(), crate::ErrorCode::Validation);
    }

    #[test]
    fn no_technicians_means_no_prices() {
        let mut rng = StdRng::seed_from_u64(11);
        let j = job("100", "200", 1);
        assert!(price_technicians(&mut rng, &j, &[]).unwrap().is_empty());
    }
}
