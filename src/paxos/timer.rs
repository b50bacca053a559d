use rand::Rng;
use std::time::Duration;

/// Random pause before a proposer retries a failed round, so that dueling
/// proposers stop preempting each other in lockstep.
pub fn random_retry_delay(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(0..=max_ms))
}
