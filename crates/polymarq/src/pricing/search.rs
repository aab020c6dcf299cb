use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::page_offset;
use crate::error::MarketError;
use crate::geo::{distance_km, Coordinates};
use crate::jobs::{JobsRepo, SortOrder};
use crate::pings::{Ping, PingStatus, PingsRepo};
use crate::pricing::quotation::quote_in_tx;
use crate::users::{User, UsersRepo};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    /// Closest to the job's client first, within the page.
    #[default]
    Dist,
    Asc,
    Desc,
}

/// How the technicians in a search result were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// No open pings yet: a page of technicians, freshly quoted.
    FirstCycle,
    /// Every ping was declined: the same technicians, quoted again.
    Requoted,
    /// Pings are still out: the technicians they went to.
    AwaitingResponses,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicianMatch {
    pub technician_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub distance_from_client: Option<f64>,
    pub price_quote: Option<BigDecimal>,
    pub currency: String,
    pub ping_status: Option<PingStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub mode: SearchMode,
    pub count: i64,
    pub technicians: Vec<TechnicianMatch>,
}

#[derive(Clone)]
pub struct TechnicianSearch {
    pool: PgPool,
    users: UsersRepo,
}

impl TechnicianSearch {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UsersRepo::new(pool.clone()),
            pool,
        }
    }

    /// Finds technicians for a job, quoting them when a new ping cycle starts.
    pub async fn search(
        &self,
        job_id: Uuid,
        order: SearchOrder,
        limit: i64,
        page: i64,
    ) -> Result<SearchOutcome, MarketError> {
        let mut tx = self.pool.begin().await?;

        let job = JobsRepo::lock(&mut tx, job_id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Job not found".into()))?;

        let origin = self
            .users
            .get(job.client_id)
            .await?
            .and_then(|c| c.coordinates());

        let pings =
            PingsRepo::for_job(&mut tx, job.id, &[PingStatus::Requested, PingStatus::Declined])
                .await?;

        let outcome = if pings.is_empty() {
            let sort = match order {
                SearchOrder::Desc => SortOrder::Desc,
                SearchOrder::Asc | SearchOrder::Dist => SortOrder::Asc,
            };
            let offset = page_offset(page, limit);
            let mut technicians = self.users.list_technicians(sort, limit, offset).await?;
            if order == SearchOrder::Dist {
                sort_by_distance(&mut technicians, origin);
            }

            let ids: Vec<Uuid> = technicians.iter().map(|t| t.id).collect();
            let quotes = quote_in_tx(&mut tx, &job, &ids).await?;
            let prices: HashMap<Uuid, BigDecimal> =
                quotes.into_iter().map(|q| (q.technician_id, q.price)).collect();

            SearchOutcome {
                mode: SearchMode::FirstCycle,
                count: self.users.count_technicians().await?,
                technicians: technicians
                    .iter()
                    .map(|t| TechnicianMatch {
                        technician_id: t.id,
                        username: t.username.clone(),
                        full_name: t.full_name.clone(),
                        distance_from_client: distance_between(origin, t),
                        price_quote: prices.get(&t.id).cloned(),
                        currency: job.currency.clone(),
                        ping_status: None,
                    })
                    .collect(),
            }
        } else if pings.iter().all(|p| p.status == PingStatus::Declined) {
            // one quote per technician, however many times they declined
            let mut seen = HashSet::new();
            let declined: Vec<&Ping> = pings
                .iter()
                .filter(|p| seen.insert(p.technician_id))
                .collect();
            let ids: Vec<Uuid> = declined.iter().map(|p| p.technician_id).collect();
            let quotes = quote_in_tx(&mut tx, &job, &ids).await?;

            let users: HashMap<Uuid, User> = self
                .users
                .by_ids(&ids)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect();

            let technicians: Vec<TechnicianMatch> = declined
                .into_iter()
                .zip(quotes)
                .filter_map(|(ping, quote)| {
                    let user = users.get(&ping.technician_id)?;
                    Some(TechnicianMatch {
                        technician_id: user.id,
                        username: user.username.clone(),
                        full_name: user.full_name.clone(),
                        distance_from_client: Some(ping.distance_from_client),
                        price_quote: Some(quote.price),
                        currency: quote.currency,
                        ping_status: Some(ping.status),
                    })
                })
                .collect();

            SearchOutcome {
                mode: SearchMode::Requoted,
                count: technicians.len() as i64,
                technicians,
            }
        } else {
            let ids: Vec<Uuid> = pings.iter().map(|p| p.technician_id).collect();
            let users: HashMap<Uuid, User> = self
                .users
                .by_ids(&ids)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect();

            let technicians: Vec<TechnicianMatch> = pings
                .iter()
                .filter_map(|ping| {
                    let user = users.get(&ping.technician_id)?;
                    Some(TechnicianMatch {
                        technician_id: user.id,
                        username: user.username.clone(),
                        full_name: user.full_name.clone(),
                        distance_from_client: Some(ping.distance_from_client),
                        price_quote: Some(ping.price_quote.clone()),
                        currency: ping.currency.clone(),
                        ping_status: Some(ping.status),
                    })
                })
                .collect();

            SearchOutcome {
                mode: SearchMode::AwaitingResponses,
                count: technicians.len() as i64,
                technicians,
            }
        };

        tx.commit().await?;

        tracing::debug!(
            job_id = %job.id,
            mode = ?outcome.mode,
            returned = outcome.technicians.len(),
            "technician search"
        );

        Ok(outcome)
    }
}

fn distance_between(origin: Option<Coordinates>, technician: &User) -> Option<f64> {
    Some(distance_km(origin?, technician.coordinates()?))
}

/// Nearest first; technicians without a location go last.
fn sort_by_distance(technicians: &mut [User], origin: Option<Coordinates>) {
    technicians.sort_by(|a, b| {
        let da = distance_between(origin, a).unwrap_or(f64::INFINITY);
        let db = distance_between(origin, b).unwrap_or(f64::INFINITY);
        da.total_cmp(&db)
    });
}
