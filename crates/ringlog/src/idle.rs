use parking_lot::{Condvar, Mutex};
use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Cooperative wait policy for a consumer observing an empty ring.
///
/// Producers never see this type directly; the [`WakeHandle`] is the only
/// producer-facing piece, used by the parking strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleStrategy {
    /// Busy loop with PAUSE hints. Minimum latency, maximum CPU.
    Spinning,
    /// Spin for `spin_limit` rounds, then yield the scheduler.
    Yielding { spin_limit: u32 },
    /// Spin for `poll_limit` empty polls, then sleep with exponential
    /// backoff between `min` and `max`.
    Sleeping {
        min: Duration,
        max: Duration,
        poll_limit: u32,
    },
    /// Park on a wake primitive; producers call [`WakeHandle::wake`] after
    /// publishing. A bounded park acts as a safety net for missed wakeups.
    Channel,
    /// Spin, then yield, then park, escalating on consecutive empty polls.
    Progressive,
}

impl IdleStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            IdleStrategy::Spinning => "spinning",
            IdleStrategy::Yielding { .. } => "yielding",
            IdleStrategy::Sleeping { .. } => "sleeping",
            IdleStrategy::Channel => "channel",
            IdleStrategy::Progressive => "progressive",
        }
    }

    /// Whether consumers using this strategy park and need producer wakeups.
    pub(crate) fn parks(&self) -> bool {
        matches!(self, IdleStrategy::Channel | IdleStrategy::Progressive)
    }
}

impl Default for IdleStrategy {
    fn default() -> Self {
        IdleStrategy::Progressive
    }
}

/// Wake primitive shared between producers and one parked consumer.
///
/// The fast path is a single atomic load on the producer side: the lock and
/// condvar are touched only while a consumer is actually parked.
#[derive(Debug, Default)]
pub struct WakeHandle {
    parked: AtomicBool,
    pending: Mutex<bool>,
    cond: Condvar,
}

impl WakeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by producers after publishing a record.
    #[inline]
    pub fn wake(&self) {
        if self.parked.load(Ordering::Acquire) {
            let mut pending = self.pending.lock();
            *pending = true;
            self.cond.notify_one();
        }
    }

    /// Park for at most `max`. Returns early on [`wake`](Self::wake); the
    /// bound catches wakeups that raced with the park itself.
    fn park(&self, max: Duration) {
        self.parked.store(true, Ordering::Release);
        let mut pending = self.pending.lock();
        if !*pending {
            self.cond.wait_for(&mut pending, max);
        }
        *pending = false;
        drop(pending);
        self.parked.store(false, Ordering::Release);
    }
}

/// Per-consumer materialization of an [`IdleStrategy`].
///
/// The consumer loop calls [`idle`](Idler::idle) on every empty poll and
/// [`reset`](Idler::reset) after every successful consume; `step` tracks
/// consecutive empty polls and drives the escalation.
#[derive(Debug)]
pub struct Idler {
    strategy: IdleStrategy,
    step: u32,
    wake: Option<Arc<WakeHandle>>,
}

impl Idler {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10;
    const PARK_MIN: Duration = Duration::from_micros(50);
    const PARK_MAX: Duration = Duration::from_millis(10);

    pub fn new(strategy: IdleStrategy, wake: Option<Arc<WakeHandle>>) -> Self {
        Self { strategy, step: 0, wake }
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    /// One idle round. Returns `true` if the consumer actually gave up the
    /// CPU (yielded, slept, or parked) rather than just spinning.
    pub fn idle(&mut self) -> bool {
        match self.strategy {
            IdleStrategy::Spinning => {
                hint::spin_loop();
                false
            }
            IdleStrategy::Yielding { spin_limit } => {
                if self.step < spin_limit {
                    self.spin_round();
                    false
                } else {
                    thread::yield_now();
                    true
                }
            }
            IdleStrategy::Sleeping { min, max, poll_limit } => {
                if self.step < poll_limit {
                    self.step += 1;
                    hint::spin_loop();
                    false
                } else {
                    let exp = (self.step - poll_limit).min(16);
                    let dur = min.saturating_mul(1 << exp).min(max).max(min);
                    self.step = self.step.saturating_add(1);
                    thread::sleep(dur);
                    true
                }
            }
            IdleStrategy::Channel => {
                self.park_round(Self::PARK_MAX);
                true
            }
            IdleStrategy::Progressive => {
                if self.step < Self::SPIN_LIMIT {
                    self.spin_round();
                    false
                } else if self.step < Self::YIELD_LIMIT {
                    self.step += 1;
                    thread::yield_now();
                    true
                } else {
                    let exp = (self.step - Self::YIELD_LIMIT).min(8);
                    let dur = Self::PARK_MIN
                        .saturating_mul(1 << exp)
                        .min(Self::PARK_MAX);
                    self.step = self.step.saturating_add(1);
                    self.park_round(dur);
                    true
                }
            }
        }
    }

    /// Collapses the escalation after a successful consume.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }

    fn spin_round(&mut self) {
        let spins = 1u32 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        self.step += 1;
    }

    fn park_round(&self, max: Duration) {
        match &self.wake {
            Some(wake) => wake.park(max),
            // No wake handle registered (e.g. a sync caller spinning on the
            // barrier); a plain bounded sleep keeps the semantics.
            None => thread::sleep(max.min(Duration::from_millis(1))),
        }
    }
}
