use bigdecimal::BigDecimal;

use crate::jobs::Job;

/// Price band technicians are quoted from for the job's current ping cycle.
///
/// Repeat cycles raise the floor by a tenth of the posted minimum per cycle.
/// Urgent jobs ignore the cycle and work from the posted band:
/// immediate jobs are quoted from the upper half, next-day jobs get a 10% floor bump.
pub fn resolve_budget_range(job: &Job) -> (BigDecimal, BigDecimal) {
    let min = job.min_price.clone();
    let max = job.max_price.clone();
    let ten = BigDecimal::from(10_i64);

    if job.require_technicians_immediately {
        return ((min + max.clone()) / BigDecimal::from(2_i64), max);
    }

    if job.require_technicians_next_day {
        return (min.clone() + min / ten, max);
    }

    if job.ping_request_cycle > 1 {
        let cycle = BigDecimal::from(i64::from(job.ping_request_cycle));
        return (min.clone() + (min / ten) * cycle, max);
    }

    (min, max)
}
