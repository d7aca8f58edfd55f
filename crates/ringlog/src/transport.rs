use crate::ring::Claim;
use crate::{Error, IdleStrategy, Result, Ring, Stats, WakeHandle};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Transport shape: one ring, or one ring per shard with a dedicated
/// consumer each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    SingleRing,
    Sharded,
}

/// Decision when a producer finds every eligible slot full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Drop the record silently and count it. Always safe under load.
    DropOnFull,
    /// Spin on adaptive backoff until a slot frees. No timeout.
    BlockOnFull,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::DropOnFull
    }
}

/// Seeds each thread's round-robin cursor so threads start on different
/// shards instead of convoying on shard 0.
static SHARD_SEED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SHARD_CURSOR: Cell<usize> =
        Cell::new(SHARD_SEED.fetch_add(1, Ordering::Relaxed));
}

fn next_shard_hint() -> usize {
    SHARD_CURSOR.with(|c| {
        let v = c.get();
        c.set(v.wrapping_add(1));
        v
    })
}

/// The record transport: N rings (N = 1 for the single-ring shape), each
/// drained by its own consumer thread.
///
/// Producers pick a shard by thread-local round-robin and probe the
/// remaining shards once before the backpressure policy applies, so a full
/// shard does not drop a record while a sibling has room.
pub struct Transport {
    rings: Box<[Arc<Ring>]>,
    policy: BackpressurePolicy,
}

impl Transport {
    /// Builds a transport with `num_shards` rings of `capacity` slots each.
    ///
    /// `num_shards` must be a power of two (1 is the single-ring shape);
    /// capacity validation is the ring's.
    pub fn new(
        num_shards: usize,
        capacity: usize,
        policy: BackpressurePolicy,
        idle: &IdleStrategy,
        stats: &Arc<Stats>,
    ) -> Result<Self> {
        if num_shards == 0 || !num_shards.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "shard count must be a power of two >= 1, got {num_shards}"
            )));
        }

        let rings = (0..num_shards)
            .map(|_| {
                let wake = idle.parks().then(|| Arc::new(WakeHandle::new()));
                Ring::new(capacity, Arc::clone(stats), wake).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();

        Ok(Self { rings, policy })
    }

    #[inline]
    pub fn architecture(&self) -> Architecture {
        if self.rings.len() == 1 {
            Architecture::SingleRing
        } else {
            Architecture::Sharded
        }
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.rings.len()
    }

    #[inline]
    pub fn rings(&self) -> &[Arc<Ring>] {
        &self.rings
    }

    #[inline]
    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Claims a slot on this thread's shard, falling back to one probe of
    /// each sibling, then to the backpressure policy. `None` means the
    /// record is dropped (and only ever under `DropOnFull`).
    pub fn claim(&self) -> Option<Claim<'_>> {
        let mask = self.rings.len() - 1;
        let start = next_shard_hint() & mask;

        for i in 0..self.rings.len() {
            let ring = &self.rings[(start + i) & mask];
            if let Some(claim) = ring.try_claim() {
                return Some(claim);
            }
        }

        match self.policy {
            BackpressurePolicy::DropOnFull => None,
            BackpressurePolicy::BlockOnFull => Some(self.rings[start].claim_blocking()),
        }
    }

    /// Total records currently in flight across all shards.
    pub fn len(&self) -> usize {
        self.rings.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.iter().all(|r| r.is_empty())
    }

    /// `true` when every shard is at capacity; a claim under `DropOnFull`
    /// would drop. Approximate under concurrent drains.
    pub fn is_full(&self) -> bool {
        self.rings.iter().all(|r| r.len() >= r.capacity())
    }
}
