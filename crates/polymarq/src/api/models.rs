use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::{Job, JobFilter, SortOrder};
use crate::pings::PingStatus;
use crate::pricing::SearchOrder;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub name: Option<String>,
    pub client_username: Option<String>,
    pub duration: Option<i32>,
    pub currency: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub require_technicians_immediately: Option<bool>,
    #[serde(default)]
    pub order: SortOrder,
    /// Technicians only: jobs nobody has taken yet instead of their own.
    #[serde(default)]
    pub open: bool,
    pub limit: Option<i64>,
    pub cursor_updated_at: Option<DateTime<Utc>>,
    pub cursor_id: Option<Uuid>,
}

impl ListJobsQuery {
    pub fn filter(&self) -> JobFilter {
        JobFilter {
            name: self.name.clone(),
            client_username: self.client_username.clone(),
            duration: self.duration,
            currency: self.currency.clone(),
            min_price: self.min_price.clone(),
            max_price: self.max_price.clone(),
            require_technicians_immediately: self.require_technicians_immediately,
            order: self.order,
        }
    }

    pub fn cursor(&self) -> Option<(DateTime<Utc>, Uuid)> {
        self.cursor_updated_at.zip(self.cursor_id)
    }
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub items: Vec<Job>,
    pub next_cursor_updated_at: Option<DateTime<Utc>>,
    pub next_cursor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub order: SearchOrder,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Counted<T> {
    pub count: i64,
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct PingUpdateRequest {
    pub status: PingStatus,
}

#[derive(Debug, Deserialize)]
pub struct JobStateRequest {
    pub job_state: f64,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<i64>,
    pub cursor_created_at: Option<DateTime<Utc>>,
    pub cursor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}
