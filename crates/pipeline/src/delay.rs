use std::time::Duration;

use rand::Rng;

/// Sample a uniformly distributed delay in `[min, max]` inclusive.
///
/// `min ≤ max` is validated at config load; if the bounds collapse the
/// single value is returned without consulting the random source. Sampling
/// happens at millisecond granularity so repeated reactions don't land on a
/// fixed cadence.
pub fn sample_delay(rng: &mut impl Rng, min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    let lo = min.as_millis().min(u128::from(u64::MAX)) as u64;
    let hi = max.as_millis().min(u128::from(u64::MAX)) as u64;
    Duration::from_millis(rng.random_range(lo..=hi))
}
