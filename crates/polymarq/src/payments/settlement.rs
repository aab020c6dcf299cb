//! Incremental payout arithmetic.
//!
//! Client and technician each report how far along the job is on a 0 to 10
//! scale. When both halves of a record are in, the pair is checked and, if it
//! passes, a share of the outstanding balance is released to the technician.
//! Everything here is pure; the payment service does the I/O around it.

use rand::Rng;

use crate::error::MarketError;
use crate::money::round2;

pub const MAX_STATE: f64 = 10.0;
/// Reports further apart than this need the two parties to talk first.
pub const MAX_STATE_DIFFERENCE: f64 = 4.0;
pub const MIN_COMBINED_PROGRESS: f64 = 1.75;
/// A payout taking the job past this point releases the whole balance.
pub const FINAL_PAYOUT_THRESHOLD: f64 = 9.75;
pub const MIN_PAYOUT_FRACTION: f64 = 0.175;

/// Platform fee for a job: 5 to 7 percent of the quote plus 0.05 per day.
pub fn transaction_cost(rng: &mut impl Rng, price_quote: f64, duration_days: i32) -> f64 {
    round2(rng.gen_range(0.05..=0.07) * price_quote + 0.05 * f64::from(duration_days))
}

/// Outcome of checking a completed pair of states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCheck {
    Proceed,
    /// The two reports disagree too much. Both parties get told.
    Conflict,
    /// Not enough combined progress for a payout. Nobody is told.
    InsufficientProgress,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payout {
    pub amount: f64,
    /// Share of the scale covered by this settlement.
    pub fraction: f64,
    pub completion_state: f64,
    pub is_final: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettlementDecision {
    Conflict,
    Skipped,
    Payout(Payout),
}

/// Financial snapshot of a job with an accepted ping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobState {
    pub price_quote: f64,
    pub transaction_cost: f64,
    pub total_amount_paid: f64,
    pub completion_state: f64,
}

impl JobState {
    pub fn total_payable_amount(&self) -> f64 {
        round2(self.price_quote - self.transaction_cost)
    }

    pub fn total_balance_due(&self) -> f64 {
        round2(self.total_payable_amount() - self.total_amount_paid)
    }

    /// A submitted state must move the job forward and stay on the scale.
    pub fn validate_completion_state(&self, state: f64) -> Result<(), MarketError> {
        let mut details = Vec::new();
        if self.completion_state >= state {
            details.push("Job completion state not progressive.".to_string());
        }
        if state > MAX_STATE {
            details.push("Job completion state is out of bound (> 10).".to_string());
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(MarketError::validation("Validation Error", details))
        }
    }

    pub fn validate_state_difference(&self, client_state: f64, technician_state: f64) -> StateCheck {
        let difference = (client_state - technician_state).abs();
        let progress = (client_state + technician_state).abs() - self.completion_state;

        if difference > MAX_STATE_DIFFERENCE {
            return StateCheck::Conflict;
        }
        if progress < MIN_COMBINED_PROGRESS {
            return StateCheck::InsufficientProgress;
        }
        StateCheck::Proceed
    }

    /// Average advance of the two reports over the current state, as a fraction of the scale.
    pub fn get_completion_state(&self, client_state: f64, technician_state: f64) -> f64 {
        let delta_client = client_state - self.completion_state;
        let delta_technician = technician_state - self.completion_state;
        (delta_client + delta_technician) / 2.0 / MAX_STATE
    }

    pub fn is_final(&self, fraction: f64) -> bool {
        self.completion_state + fraction * MAX_STATE > FINAL_PAYOUT_THRESHOLD
    }

    pub fn get_amount_by_completion_state(&self, fraction: f64) -> Result<f64, MarketError> {
        let is_final = self.is_final(fraction);

        if !is_final && fraction <= MIN_PAYOUT_FRACTION {
            return Err(MarketError::validation(
                "Payment Error",
                vec!["Not a significant state progress.".to_string()],
            ));
        }

        let amount = if is_final {
            self.total_balance_due()
        } else {
            self.total_balance_due() * fraction
        };
        Ok(round2(amount))
    }

    /// Runs the whole decision for a completed pair of states.
    pub fn settle(
        &self,
        client_state: f64,
        technician_state: f64,
    ) -> Result<SettlementDecision, MarketError> {
        match self.validate_state_difference(client_state, technician_state) {
            StateCheck::Conflict => return Ok(SettlementDecision::Conflict),
            StateCheck::InsufficientProgress => return Ok(SettlementDecision::Skipped),
            StateCheck::Proceed => {}
        }

        let fraction = self.get_completion_state(client_state, technician_state);
        let amount = self.get_amount_by_completion_state(fraction)?;

        if amount <= 0.0 {
            return Err(MarketError::validation(
                "Payment Error",
                vec!["Out of balance due".to_string()],
            ));
        }

        let completion_state = round2(self.completion_state + fraction * MAX_STATE).min(MAX_STATE);
        let is_final = self.is_final(fraction);

        // nothing is left to pay after a final payout
        Ok(SettlementDecision::Payout(Payout {
            amount,
            fraction,
            completion_state,
            is_final,
            verified: is_final || completion_state.floor() as i64 == MAX_STATE as i64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rand::{rngs::StdRng, SeedableRng};

    fn state(completion: f64) -> JobState {
        JobState {
            price_quote: 10_000.0,
            transaction_cost: 600.0,
            total_amount_paid: 0.0,
            completion_state: completion,
        }
    }

    #[test]
    fn balance_is_quote_minus_cost_minus_paid() {
        let mut s = state(0.0);
        assert_eq!(s.total_payable_amount(), 9_400.0);
        s.total_amount_paid = 4_700.0;
        assert_eq!(s.total_balance_due(), 4_700.0);
    }

    #[test]
    fn transaction_cost_stays_in_its_band() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let cost = transaction_cost(&mut rng, 10_000.0, 4);
            // 500..700 plus 0.2 for four days
            assert!((500.2..=700.2).contains(&cost), "{cost}");
            assert_eq!(round2(cost), cost);
        }
    }

    #[test]
    fn completion_fraction_averages_both_reports() {
        let s = state(0.0);
        assert_eq!(s.get_completion_state(4.0, 6.0), 0.5);

        let s = state(4.0);
        // ((6-4) + (8-4)) / 2 / 10
        assert!((s.get_completion_state(6.0, 8.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn half_way_pays_half_the_balance() {
        let s = state(0.0);
        let amount = s.get_amount_by_completion_state(0.5).unwrap();
        assert_eq!(amount, round2(s.total_balance_due() * 0.5));
        assert_eq!(amount, 4_700.0);
    }

    #[test]
    fn close_agreement_proceeds_and_wide_gap_conflicts() {
        let s = state(0.0);
        assert_eq!(s.validate_state_difference(4.0, 6.0), StateCheck::Proceed);
        assert_eq!(s.validate_state_difference(1.0, 9.0), StateCheck::Conflict);
    }

    #[test]
    fn small_combined_progress_is_skipped() {
        let s = state(0.0);
        assert_eq!(
            s.validate_state_difference(0.5, 1.0),
            StateCheck::InsufficientProgress
        );
    }

    #[test]
    fn completion_state_must_progress_and_stay_on_the_scale() {
        let s = state(3.0);
        let err = s.validate_completion_state(3.0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
        assert_eq!(err.details(), vec!["Job completion state not progressive.".to_string()]);

        let err = s.validate_completion_state(10.5).unwrap_err();
        assert_eq!(
            err.details(),
            vec!["Job completion state is out of bound (> 10).".to_string()]
        );

        assert!(s.validate_completion_state(3.01).is_ok());
        assert!(s.validate_completion_state(10.0).is_ok());
    }

    #[test]
    fn finished_job_accepts_no_more_states() {
        let s = state(10.0);
        assert!(s.validate_completion_state(10.0).is_err());
        assert!(s.validate_completion_state(10.5).is_err());
    }

    #[test]
    fn tiny_fraction_is_rejected_even_when_the_pair_passes() {
        // combined progress 8 - 3 clears the 1.75 gate, but the fraction is only 0.1
        let s = state(3.0);
        assert_eq!(s.validate_state_difference(4.0, 4.0), StateCheck::Proceed);
        let err = s.settle(4.0, 4.0).unwrap_err();
        assert_eq!(err.details(), vec!["Not a significant state progress.".to_string()]);
    }

    #[test]
    fn settle_pays_and_advances() {
        let s = state(0.0);
        match s.settle(4.0, 6.0).unwrap() {
            SettlementDecision::Payout(p) => {
                assert_eq!(p.amount, 4_700.0);
                assert_eq!(p.fraction, 0.5);
                assert_eq!(p.completion_state, 5.0);
                assert!(!p.is_final);
                assert!(!p.verified);
            }
            other => panic!("expected payout, got {other:?}"),
        }
    }

    #[test]
    fn final_settlement_releases_the_whole_balance_and_verifies() {
        let mut s = state(5.0);
        s.total_amount_paid = 4_700.0;
        match s.settle(10.0, 9.6).unwrap() {
            SettlementDecision::Payout(p) => {
                assert!(p.is_final);
                assert_eq!(p.amount, 4_700.0);
                assert_eq!(p.completion_state, 9.8);
                // short of 10, but nothing is left to pay
                assert!(p.verified);
            }
            other => panic!("expected payout, got {other:?}"),
        }

        match s.settle(10.0, 10.0).unwrap() {
            SettlementDecision::Payout(p) => {
                assert_eq!(p.completion_state, 10.0);
                assert!(p.verified);
            }
            other => panic!("expected payout, got {other:?}"),
        }
    }

    #[test]
    fn nothing_left_to_pay_is_an_error() {
        let mut s = state(5.0);
        s.total_amount_paid = 9_400.0;
        let err = s.settle(10.0, 10.0).unwrap_err();
        assert_eq!(err.details(), vec!["Out of balance due".to_string()]);
    }

    #[test]
    fn conflict_and_skip_do_not_pay() {
        let s = state(0.0);
        assert_eq!(s.settle(1.0, 9.0).unwrap(), SettlementDecision::Conflict);
        assert_eq!(s.settle(0.5, 1.0).unwrap(), SettlementDecision::Skipped);
    }
}
