use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PingStatus {
    Requested,
    Declined,
    Accepted,
    Negotiating,
    Expired,
}

impl PingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PingStatus::Requested => "REQUESTED",
            PingStatus::Declined => "DECLINED",
            PingStatus::Accepted => "ACCEPTED",
            PingStatus::Negotiating => "NEGOTIATING",
            PingStatus::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown ping status {0:?}")]
pub struct UnknownPingStatus(pub String);

impl TryFrom<String> for PingStatus {
    type Error = UnknownPingStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "REQUESTED" => Ok(PingStatus::Requested),
            "DECLINED" => Ok(PingStatus::Declined),
            "ACCEPTED" => Ok(PingStatus::Accepted),
            "NEGOTIATING" => Ok(PingStatus::Negotiating),
            "EXPIRED" => Ok(PingStatus::Expired),
            _ => Err(UnknownPingStatus(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ping {
    pub id: Uuid,
    pub job_id: Uuid,
    pub technician_id: Uuid,
    pub client_id: Uuid,
    /// Kilometres, fixed at creation.
    pub distance_from_client: f64,
    #[sqlx(try_from = "String")]
    pub status: PingStatus,
    pub price_quote: BigDecimal,
    pub currency: String,
    pub transaction_cost: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ping {
    pub fn price_quote(&self) -> Money {
        Money::new(self.price_quote.clone(), self.currency.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPing {
    pub job_id: Uuid,
    pub technician_id: Uuid,
}

/// Budget band suggested to a client when a technician negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetRecommendation {
    pub min_price: f64,
    pub max_price: f64,
}
