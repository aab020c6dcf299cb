use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::page_offset;
use crate::error::MarketError;
use crate::geo::distance_km;
use crate::jobs::JobsRepo;
use crate::money::decimal_to_f64;
use crate::notifications::{NotificationType, SharedNotifier};
use crate::pings::machine::{plan_response, recommend_budget, PingEffect};
use crate::pings::model::{BudgetRecommendation, NewPing, Ping, PingStatus};
use crate::pings::repo::PingsRepo;
use crate::pricing::{quote_in_tx, QuotationsRepo};
use crate::users::{User, UsersRepo};

const MAX_PINGS_MESSAGE: &str = "Maximum number of pings reached. Wait till one of your pings \
                                 is accepted or declined before trying again.";

/// Result of a technician answering a ping.
#[derive(Debug, Clone, Serialize)]
pub struct PingReply {
    pub ping: Ping,
    pub expired_siblings: u64,
    pub job_price_recommendation: Option<BudgetRecommendation>,
}

#[derive(Clone)]
pub struct PingService {
    pool: PgPool,
    pings: PingsRepo,
    notifier: SharedNotifier,
    max_requested: i64,
}

impl PingService {
    pub fn new(pool: PgPool, notifier: SharedNotifier, max_requested: i64) -> Self {
        Self {
            pings: PingsRepo::new(pool.clone()),
            pool,
            notifier,
            max_requested,
        }
    }

    /// A client offers one of their jobs to a technician.
    pub async fn create_ping(&self, client: &User, req: NewPing) -> Result<Ping, MarketError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent creations by one client would otherwise both pass the cap.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(client.id.to_string())
            .execute(&mut *tx)
            .await?;

        let outstanding = PingsRepo::count_requested_for_client(&mut tx, client.id).await?;
        if outstanding >= self.max_requested {
            return Err(MarketError::Conflict(MAX_PINGS_MESSAGE.into()));
        }

        let technician = UsersRepo::get_technician(&mut tx, req.technician_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Technician not found".into()))?;

        let job = JobsRepo::lock(&mut tx, req.job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;

        if job.client_id != client.id {
            return Err(MarketError::Forbidden(
                "You can only send requests for your own jobs".into(),
            ));
        }
        if job.technician_id.is_some() {
            return Err(MarketError::Conflict(
                "A technician has already accepted this job".into(),
            ));
        }
        if PingsRepo::exists_live_for_technician(&mut tx, job.id, technician.id).await? {
            return Err(MarketError::Conflict(
                "This technician already has a request for this job".into(),
            ));
        }

        let (Some(from), Some(to)) = (client.coordinates(), technician.coordinates()) else {
            return Err(MarketError::invalid(
                "Client and technician locations are required to send a request",
            ));
        };
        let distance = distance_km(from, to);

        let price = match QuotationsRepo::get(&mut tx, job.id, technician.id).await? {
            Some(q) => q.price,
            None => quote_in_tx(&mut tx, &job, &[technician.id])
                .await?
                .into_iter()
                .next()
                .map(|q| q.price)
                .ok_or_else(|| {
                    MarketError::Internal(anyhow::anyhow!("single quotation produced no row"))
                })?,
        };

        let ping = PingsRepo::insert(
            &mut tx,
            job.id,
            technician.id,
            client.id,
            distance,
            &price,
            &job.currency,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            ping_id = %ping.id,
            job_id = %job.id,
            technician_id = %technician.id,
            distance_km = distance,
            "ping created"
        );

        self.notifier
            .send(
                technician.id,
                NotificationType::Job,
                "Job Request",
                "A client has just requested your services. Check your dashboard for more info.",
                Some(json!({ "ping_id": ping.id, "job_id": job.id })),
            )
            .await;

        Ok(ping)
    }

    /// A technician accepts, declines or negotiates a ping sent to them.
    pub async fn respond(
        &self,
        technician: &User,
        ping_id: Uuid,
        target: PingStatus,
    ) -> Result<PingReply, MarketError> {
        let not_found = || MarketError::NotFound("Ping not found".into());

        let ping = self.pings.get_open(ping_id).await?.ok_or_else(not_found)?;
        if ping.technician_id != technician.id {
            return Err(MarketError::Forbidden(
                "This job request was sent to another technician".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // job first, then ping: same order as every other writer on this job
        let job = JobsRepo::lock(&mut tx, ping.job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;
        let ping = PingsRepo::lock_open(&mut tx, ping_id)
            .await?
            .ok_or_else(not_found)?;

        let effect = plan_response(ping.status, target)?;
        let ping = PingsRepo::set_status(&mut tx, ping.id, target).await?;

        let mut expired_siblings = 0;
        let mut recommendation = None;

        match effect {
            PingEffect::Accept => {
                expired_siblings = PingsRepo::expire_siblings(&mut tx, job.id, ping.id).await?;
                JobsRepo::bind_technician(&mut tx, job.id, technician.id).await?;
                QuotationsRepo::mark_accepted(&mut tx, job.id, technician.id).await?;
            }
            PingEffect::Decline => {}
            PingEffect::Negotiate => {
                let quotes: Vec<f64> = PingsRepo::negotiation_quotes(&mut tx, job.id)
                    .await?
                    .iter()
                    .map(decimal_to_f64)
                    .collect();
                recommendation = recommend_budget(&quotes);
            }
        }

        tx.commit().await?;

        tracing::info!(
            ping_id = %ping.id,
            job_id = %job.id,
            status = ping.status.as_str(),
            expired_siblings,
            "ping answered"
        );

        let who = &technician.username;
        let (title, body, payload) = match effect {
            PingEffect::Accept => (
                "Job Request Accepted",
                format!("{who} has accepted your job request."),
                json!({ "ping_id": ping.id, "job_id": job.id }),
            ),
            PingEffect::Decline => (
                "Job Request Declined",
                format!("{who} has declined your job request."),
                json!({ "ping_id": ping.id, "job_id": job.id }),
            ),
            PingEffect::Negotiate => {
                let body = match recommendation {
                    Some(r) => format!(
                        "{who} is negotiating your job request. Recommended price range is {:.2} - {:.2}",
                        r.min_price, r.max_price
                    ),
                    None => format!("{who} is negotiating your job request."),
                };
                (
                    "Job Request Negotiated",
                    body,
                    json!({
                        "ping_id": ping.id,
                        "job_id": job.id,
                        "job_price_recommendation": recommendation,
                    }),
                )
            }
        };

        self.notifier
            .send(ping.client_id, NotificationType::Job, title, &body, Some(payload))
            .await;

        Ok(PingReply {
            ping,
            expired_siblings,
            job_price_recommendation: recommendation,
        })
    }

    /// Pending requests addressed to a technician, newest first, with the total.
    pub async fn list_requests(
        &self,
        technician: &User,
        limit: i64,
        page: i64,
    ) -> Result<(Vec<Ping>, i64), MarketError> {
        let offset = page_offset(page, limit);
        let rows = self
            .pings
            .list_requested_for_technician(technician.id, limit, offset)
            .await?;
        let count = self.pings.count_requested_for_technician(technician.id).await?;
        Ok((rows, count))
    }

    /// Expires requests nobody answered within `ttl`, and tells their clients.
    pub async fn expire_stale(&self, ttl: Duration, batch: i64) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - ttl;
        let expired = self.pings.expire_requested_before(cutoff, batch).await?;

        for ping in &expired {
            self.notifier
                .send(
                    ping.client_id,
                    NotificationType::Job,
                    "Job Request Expired",
                    "A technician did not respond to your job request in time.",
                    Some(json!({ "ping_id": ping.id, "job_id": ping.job_id })),
                )
                .await;
        }

        Ok(expired.len())
    }
}
