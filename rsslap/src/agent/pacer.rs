use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rsslap_core::TaskSpec;
use std::num::NonZeroU32;
use std::time::Duration;

/// Waits between the statements of one agent.
pub(crate) enum Pacer {
    Unlimited,
    /// At most `rate` statement starts per second.
    Rate(DefaultDirectRateLimiter),
    /// A fixed pause plus uniform jitter in `[0, spread]`.
    Delay {
        delay: Duration,
        spread: Duration,
        rng: SmallRng,
    },
}

impl Pacer {
    pub fn new(spec: &TaskSpec, seed: u64) -> Self {
        if let Some(rate) = spec.rate() {
            Pacer::Rate(rate_limiter(rate))
        } else if !spec.delay().is_zero() {
            Pacer::Delay {
                delay: spec.delay(),
                spread: spec.spread(),
                rng: SmallRng::seed_from_u64(seed),
            }
        } else {
            Pacer::Unlimited
        }
    }

    pub async fn wait(&mut self) {
        match self {
            // Drivers that never suspend would otherwise starve the timers.
            Pacer::Unlimited => tokio::task::yield_now().await,
            Pacer::Rate(limiter) => limiter.until_ready().await,
            Pacer::Delay { delay, spread, rng } => {
                let pause = *delay + jitter(*spread, rng);
                tokio::time::sleep(pause).await;
            }
        }
    }
}

fn jitter(spread: Duration, rng: &mut SmallRng) -> Duration {
    if spread.is_zero() {
        return Duration::ZERO;
    }

    let max = u64::try_from(spread.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rng.gen_range(0..=max))
}

fn rate_limiter(rate: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(rate).allow_burst(NonZeroU32::MIN))
}
