use std::collections::HashSet;

use rand::Rng;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    #[error("range [{low}, {high}] holds fewer than {count} distinct values at precision {precision}")]
    RangeTooNarrow {
        low: f64,
        high: f64,
        count: usize,
        precision: u32,
    },

    #[error("invalid range: low {low} is greater than high {high}")]
    InvalidRange { low: f64, high: f64 },

    #[error("gave up after {draws} draws with {found} of {count} distinct values")]
    Exhausted {
        draws: usize,
        found: usize,
        count: usize,
    },
}

/// Draw `count` distinct prices uniformly from `[low, high]`, rounded to
/// `precision` decimals. Values come back in draw order.
pub fn sample_unique_uniform(
    rng: &mut impl Rng,
    low: f64,
    high: f64,
    count: usize,
    precision: u32,
) -> Result<Vec<f64>, SampleError> {
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(SampleError::InvalidRange { low, high });
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let scale = 10_f64.powi(precision as i32);
    let capacity = (high * scale).round() - (low * scale).round() + 1.0;
    if capacity < count as f64 {
        return Err(SampleError::RangeTooNarrow {
            low,
            high,
            count,
            precision,
        });
    }

    // Bounds whose rounding lands on a half step are reachable with probability ~0,
    // so cap the loop instead of spinning forever on them.
    let max_draws = count.saturating_mul(1_000).max(10_000);

    let mut seen: HashSet<i64> = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    let mut draws = 0;

    while out.len() < count {
        if draws >= max_draws {
            return Err(SampleError::Exhausted {
                draws,
                found: out.len(),
                count,
            });
        }
        draws += 1;

        let steps = (rng.gen_range(low..=high) * scale).round();
        if seen.insert(steps as i64) {
            out.push(steps / scale);
        }
    }

    Ok(out)
}
