//! Sampling gates applied after the level check and before record assembly.
//!
//! Samplers see every qualifying call from every producer thread, so their
//! state is atomic-only. The trait is deliberately narrow to keep
//! implementations swappable.

use crate::Level;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Verdict for one qualifying log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingDecision {
    Log,
    Drop,
}

/// Counters every sampler maintains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub sampled: u64,
    pub dropped: u64,
}

/// Decides whether a record that passed the level gate is kept.
///
/// `sample` is called concurrently from any number of producer threads.
pub trait Sampler: Send + Sync {
    fn sample(&self, level: Level, message: &str) -> SamplingDecision;

    fn stats(&self) -> SamplerStats;
}

// ---------------------------------------------------------------------
// Token bucket
// ---------------------------------------------------------------------

/// Classic token bucket: `capacity` burst, `refill` tokens every `interval`.
///
/// The refill clock is an `Instant` anchored at construction, so wall-clock
/// adjustments never produce negative elapsed time.
pub struct TokenBucketSampler {
    capacity: u64,
    refill: u64,
    interval_nanos: u64,
    start: Instant,
    /// Nanoseconds since `start` at which the bucket last refilled.
    last_refill: AtomicU64,
    tokens: AtomicU64,
    sampled: AtomicU64,
    dropped: AtomicU64,
}

impl TokenBucketSampler {
    /// A bucket starting full. `interval` of zero disables refilling.
    pub fn new(capacity: u64, refill: u64, interval: Duration) -> Self {
        Self {
            capacity,
            refill,
            interval_nanos: interval.as_nanos() as u64,
            start: Instant::now(),
            last_refill: AtomicU64::new(0),
            tokens: AtomicU64::new(capacity),
            sampled: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn refill_elapsed(&self, now: u64) {
        if self.interval_nanos == 0 || self.refill == 0 {
            return;
        }
        loop {
            let last = self.last_refill.load(Ordering::Relaxed);
            let ticks = now.saturating_sub(last) / self.interval_nanos;
            if ticks == 0 {
                return;
            }
            // Claim the elapsed ticks; the winner credits the tokens.
            if self
                .last_refill
                .compare_exchange_weak(
                    last,
                    last + ticks * self.interval_nanos,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                let add = ticks.saturating_mul(self.refill);
                loop {
                    let cur = self.tokens.load(Ordering::Relaxed);
                    let next = cur.saturating_add(add).min(self.capacity);
                    if next == cur
                        || self
                            .tokens
                            .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
                            .is_ok()
                    {
                        break;
                    }
                }
                return;
            }
        }
    }
}

impl Sampler for TokenBucketSampler {
    fn sample(&self, _level: Level, _message: &str) -> SamplingDecision {
        let now = self.start.elapsed().as_nanos() as u64;
        self.refill_elapsed(now);

        loop {
            let tokens = self.tokens.load(Ordering::Relaxed);
            if tokens == 0 {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return SamplingDecision::Drop;
            }
            if self
                .tokens
                .compare_exchange_weak(tokens, tokens - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                self.sampled.fetch_add(1, Ordering::Relaxed);
                return SamplingDecision::Log;
            }
        }
    }

    fn stats(&self) -> SamplerStats {
        SamplerStats {
            sampled: self.sampled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------
// Reservoir ("first N, then 1 in K")
// ---------------------------------------------------------------------

/// Keeps the first `initial` records of every tick, then one of every
/// `thereafter`. A `tick` of zero never resets the window.
pub struct ReservoirSampler {
    initial: u64,
    thereafter: u64,
    tick_nanos: u64,
    start: Instant,
    /// Nanoseconds since `start` at which the current tick began.
    tick_start: AtomicU64,
    counter: AtomicU64,
    sampled: AtomicU64,
    dropped: AtomicU64,
}

impl ReservoirSampler {
    pub fn new(initial: u64, thereafter: u64, tick: Duration) -> Self {
        Self {
            initial,
            thereafter,
            tick_nanos: tick.as_nanos() as u64,
            start: Instant::now(),
            tick_start: AtomicU64::new(0),
            counter: AtomicU64::new(0),
            sampled: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn maybe_reset_tick(&self) {
        if self.tick_nanos == 0 {
            return;
        }
        let now = self.start.elapsed().as_nanos() as u64;
        let tick_start = self.tick_start.load(Ordering::Relaxed);
        if now.saturating_sub(tick_start) >= self.tick_nanos
            && self
                .tick_start
                .compare_exchange(tick_start, now, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            // The CAS winner opens the new tick; losers keep counting into
            // it, which at worst shifts the free window by a few entries.
            self.counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Sampler for ReservoirSampler {
    fn sample(&self, _level: Level, _message: &str) -> SamplingDecision {
        self.maybe_reset_tick();

        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let keep = if n <= self.initial {
            true
        } else {
            self.thereafter > 0 && (n - self.initial) % self.thereafter == 0
        };

        if keep {
            self.sampled.fetch_add(1, Ordering::Relaxed);
            SamplingDecision::Log
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            SamplingDecision::Drop
        }
    }

    fn stats(&self) -> SamplerStats {
        SamplerStats {
            sampled: self.sampled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_token_bucket_burst_then_drop() {
        // Capacity 2, no refill on any realistic horizon.
        let sampler = TokenBucketSampler::new(2, 0, Duration::from_secs(3600));

        let decisions: Vec<_> = (0..5)
            .map(|_| sampler.sample(Level::Info, "m"))
            .collect();

        assert_eq!(
            decisions,
            vec![
                SamplingDecision::Log,
                SamplingDecision::Log,
                SamplingDecision::Drop,
                SamplingDecision::Drop,
                SamplingDecision::Drop,
            ]
        );
        assert_eq!(sampler.stats(), SamplerStats { sampled: 2, dropped: 3 });
    }

    #[test]
    fn test_token_bucket_refills() {
        let sampler = TokenBucketSampler::new(1, 1, Duration::from_millis(5));
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Log);
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Drop);

        thread::sleep(Duration::from_millis(15));
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Log);
    }

    #[test]
    fn test_token_bucket_refill_clamps_to_capacity() {
        let sampler = TokenBucketSampler::new(2, 100, Duration::from_millis(1));
        thread::sleep(Duration::from_millis(10));

        // However long we waited, at most `capacity` tokens are available.
        let kept = (0..10)
            .filter(|_| sampler.sample(Level::Info, "m") == SamplingDecision::Log)
            .count();
        assert_eq!(kept, 2);
    }

    #[test]
    fn test_reservoir_first_n_then_one_in_k() {
        let sampler = ReservoirSampler::new(3, 4, Duration::ZERO);

        let kept: Vec<_> = (1..=15)
            .map(|_| sampler.sample(Level::Info, "m") == SamplingDecision::Log)
            .collect();

        // First 3 free, then every 4th after the window: 7, 11, 15.
        let expected: Vec<_> = (1..=15)
            .map(|n| n <= 3 || (n - 3) % 4 == 0)
            .collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_reservoir_zero_initial_skips_free_window() {
        let sampler = ReservoirSampler::new(0, 2, Duration::ZERO);
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Drop);
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Log);
    }

    #[test]
    fn test_reservoir_tick_resets_window() {
        let sampler = ReservoirSampler::new(1, 0, Duration::from_millis(5));
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Log);
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Drop);

        thread::sleep(Duration::from_millis(10));
        assert_eq!(sampler.sample(Level::Info, "m"), SamplingDecision::Log);
    }

    #[test]
    fn test_concurrent_sampling_accounts_for_everything() {
        let sampler = Arc::new(TokenBucketSampler::new(100, 0, Duration::ZERO));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sampler = Arc::clone(&sampler);
                thread::spawn(move || {
                    for _ in 0..100 {
                        sampler.sample(Level::Info, "m");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = sampler.stats();
        assert_eq!(stats.sampled + stats.dropped, 400);
        assert_eq!(stats.sampled, 100);
    }
}
