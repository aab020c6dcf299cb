use crate::error::MarketError;
use crate::money::round2;
use crate::pings::model::{BudgetRecommendation, PingStatus};

/// What a technician's response does beyond moving the ping's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingEffect {
    /// Expire siblings, bind the technician, start the job.
    Accept,
    Decline,
    /// Recommend a budget band to the client.
    Negotiate,
}

/// Decides whether `current -> target` is allowed.
pub fn plan_response(current: PingStatus, target: PingStatus) -> Result<PingEffect, MarketError> {
    if current == PingStatus::Expired {
        return Err(MarketError::NotFound("Ping not found".into()));
    }
    if current == target {
        return Err(MarketError::Conflict(
            "Job is already in the desired state.".into(),
        ));
    }
    if current == PingStatus::Accepted {
        return Err(MarketError::Conflict(
            "Job request has already been accepted.".into(),
        ));
    }

    match target {
        PingStatus::Accepted => Ok(PingEffect::Accept),
        PingStatus::Declined => Ok(PingEffect::Decline),
        PingStatus::Negotiating => Ok(PingEffect::Negotiate),
        PingStatus::Requested | PingStatus::Expired => Err(MarketError::invalid(format!(
            "{} is not a valid response",
            target.as_str()
        ))),
    }
}

/// Upper median of the declined and negotiating quotes, plus or minus 10%.
pub fn recommend_budget(quotes: &[f64]) -> Option<BudgetRecommendation> {
    if quotes.is_empty() {
        return None;
    }

    let mut sorted = quotes.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted[sorted.len() / 2];

    Some(BudgetRecommendation {
        min_price: round2(median - 0.1 * median),
        max_price: round2(median + 0.1 * median),
    })
}
