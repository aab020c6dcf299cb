use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::decimal_to_f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Done,
    Verified,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Done => "DONE",
            JobStatus::Verified => "VERIFIED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job status {0:?}")]
pub struct UnknownJobStatus(pub String);

impl TryFrom<String> for JobStatus {
    type Error = UnknownJobStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "DONE" => Ok(JobStatus::Done),
            "VERIFIED" => Ok(JobStatus::Verified),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownJobStatus(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub client_id: Uuid,
    pub technician_id: Option<Uuid>,

    pub name: String,
    pub description: String,
    pub location_address: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,

    pub min_price: BigDecimal,
    pub max_price: BigDecimal,
    pub currency: String,
    /// Days.
    pub duration: i32,
    pub require_technicians_immediately: bool,
    pub require_technicians_next_day: bool,

    pub completion_state: BigDecimal,
    pub ping_request_cycle: i32,
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn completion(&self) -> f64 {
        decimal_to_f64(&self.completion_state)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub description: String,
    pub location_address: String,
    pub min_price: BigDecimal,
    pub max_price: BigDecimal,
    pub currency: Option<String>,
    pub duration: i32,
    #[serde(default)]
    pub require_technicians_immediately: bool,
    #[serde(default)]
    pub require_technicians_next_day: bool,
}

impl NewJob {
    /// Every failed check is reported, not just the first.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.name.trim().is_empty() {
            out.push("name is required".to_string());
        }
        if self.location_address.trim().is_empty() {
            out.push("location_address is required".to_string());
        }
        if self.duration <= 0 {
            out.push("duration must be a positive number of days".to_string());
        }
        out.extend(price_band_problems(&self.min_price, &self.max_price));
        if let Some(currency) = self.currency.as_deref() {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                out.push(format!("currency {currency:?} is not an ISO 4217 code"));
            }
        }
        out
    }
}

fn price_band_problems(min: &BigDecimal, max: &BigDecimal) -> Vec<String> {
    let zero = BigDecimal::from(0_i64);
    let mut out = Vec::new();
    if *min <= zero {
        out.push("min_price must be greater than zero".to_string());
    }
    if min > max {
        out.push("min_price cannot exceed max_price".to_string());
    }
    out
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location_address: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub duration: Option<i32>,
    pub require_technicians_immediately: Option<bool>,
    pub require_technicians_next_day: Option<bool>,
}

impl JobUpdate {
    /// Checks the update against the job it will be applied to.
    pub fn problems(&self, current: &Job) -> Vec<String> {
        let mut out = Vec::new();
        if matches!(self.name.as_deref(), Some(n) if n.trim().is_empty()) {
            out.push("name cannot be blank".to_string());
        }
        if matches!(self.duration, Some(d) if d <= 0) {
            out.push("duration must be a positive number of days".to_string());
        }
        if self.min_price.is_some() || self.max_price.is_some() {
            let min = self.min_price.as_ref().unwrap_or(&current.min_price);
            let max = self.max_price.as_ref().unwrap_or(&current.max_price);
            out.extend(price_band_problems(min, max));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Who is asking decides the base scope of a job listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    /// Jobs posted by this client.
    Client(Uuid),
    /// Jobs bound to this technician.
    Technician(Uuid),
    /// Jobs nobody has taken yet.
    Open,
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub name: Option<String>,
    pub client_username: Option<String>,
    pub duration: Option<i32>,
    pub currency: Option<String>,
    pub min_price: Option<BigDecimal>,
    pub max_price: Option<BigDecimal>,
    pub require_technicians_immediately: Option<bool>,
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn new_job(min: &str, max: &str) -> NewJob {
        NewJob {
            name: "Fix sink".into(),
            description: String::new(),
            location_address: "12 Admiralty Way".into(),
            min_price: BigDecimal::from_str(min).unwrap(),
            max_price: BigDecimal::from_str(max).unwrap(),
            currency: None,
            duration: 2,
            require_technicians_immediately: false,
            require_technicians_next_day: false,
        }
    }

    #[test]
    fn status_round_trips_through_its_column_value() {
        for s in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Done,
            JobStatus::Verified,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::try_from(s.as_str().to_string()).unwrap(), s);
        }
        assert!(JobStatus::try_from("queued".to_string()).is_err());
    }

    #[test]
    fn valid_job_has_no_problems() {
        assert!(new_job("100", "200").problems().is_empty());
    }

    #[test]
    fn inverted_band_and_bad_duration_are_both_reported() {
        let mut job = new_job("300", "200");
        job.duration = 0;
        let problems = job.problems();
        assert_eq!(problems.len(), 2, "{problems:?}");
    }

    #[test]
    fn currency_must_look_like_iso() {
        let mut job = new_job("100", "200");
        job.currency = Some("NAIRA".into());
        assert_eq!(job.problems().len(), 1);
    }
}
