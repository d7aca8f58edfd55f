use crate::invariants::{
    debug_assert_bounded_count, debug_assert_monotonic, debug_assert_slot_release,
    debug_assert_slot_state,
};
use crate::{Error, Idler, IdleStrategy, Record, Result, Stats, WakeHandle};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This MPSC ring buffer hands records from many producers to one consumer
// through a per-slot sequence atomic, which is the only synchronization the
// record contents need.
//
// ## Slot States
//
// Each slot carries an unbounded u64 `sequence` encoding its ownership:
// - `sequence == cursor`            → empty, claimable for this lap
// - `sequence == cursor + 1`        → published, readable by the consumer
// - `sequence == cursor + capacity` → released, claimable next lap
//
// Cursors are unbounded u64 values; the buffer index is `cursor & mask`.
// With 2^64 sequences, wrap-around is not a practical concern.
//
// ## Producer (claim/publish path)
//
// 1. Load `producer_cursor` with Relaxed
// 2. Load the slot `sequence` with Acquire (synchronizes with the consumer's
//    Release of the previous lap)
// 3. If the slot is empty for this lap, install `cursor + 1` into
//    `producer_cursor` by CAS. CAS rather than fetch-add: a failed claim must
//    leave the cursor untouched, otherwise a drop under backpressure would
//    leave a sequence the consumer waits on forever.
// 4. Write the record through the `UnsafeCell` (exclusive: the CAS winner is
//    the only thread between claim and publish that may touch this slot)
// 5. Store `sequence = cursor + 1` with Release (publishes the record)
//
// ## Consumer (drain path)
//
// 1. Load `consumer_cursor` with Relaxed (single writer: the consumer)
// 2. Load the slot `sequence` with Acquire (synchronizes with the producer's
//    Release publish; the record contents are fully visible after this)
// 3. Read and reset the record through the `UnsafeCell`
// 4. Store `sequence = cursor + capacity` with Release (frees the slot)
// 5. Store `consumer_cursor = cursor + 1` with Release (read by sync-barrier
//    callers on other threads)
//
// =============================================================================

/// One ring slot: a pre-allocated record plus its ownership sequence.
struct Slot {
    sequence: AtomicU64,
    record: UnsafeCell<Record>,
}

/// Lock-free MPSC ring buffer of pre-allocated [`Record`]s.
///
/// Any number of producers may claim and publish concurrently; exactly one
/// consumer thread may drain. Capacity is a power of two ≥ 2, validated at
/// construction.
pub struct Ring {
    slots: Box<[Slot]>,
    mask: u64,
    capacity: u64,
    /// Next sequence to claim (written by producers via CAS).
    producer_cursor: CachePadded<AtomicU64>,
    /// Next sequence to consume (written only by the consumer, read by
    /// sync-barrier callers).
    consumer_cursor: CachePadded<AtomicU64>,
    stats: Arc<Stats>,
    /// Present when the idle strategy parks; producers wake through it.
    wake: Option<Arc<WakeHandle>>,
}

// Safety: the slot sequence protocol above gives each slot exactly one owner
// at a time; Record holds only Send payloads (String, Vec, Arc<dyn .. + Send
// + Sync>).
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    /// Creates a ring with `capacity` slots.
    ///
    /// `capacity` must be a power of two ≥ 2; anything else is rejected with
    /// `InvalidConfig` rather than rounded.
    pub fn new(
        capacity: usize,
        stats: Arc<Stats>,
        wake: Option<Arc<WakeHandle>>,
    ) -> Result<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "ring capacity must be a power of two >= 2, got {capacity}"
            )));
        }

        let slots = (0..capacity as u64)
            .map(|i| Slot {
                sequence: AtomicU64::new(i),
                record: UnsafeCell::new(Record::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            mask: capacity as u64 - 1,
            capacity: capacity as u64,
            producer_cursor: CachePadded::new(AtomicU64::new(0)),
            consumer_cursor: CachePadded::new(AtomicU64::new(0)),
            stats,
            wake,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of claimed-but-not-yet-consumed records (approximate under
    /// concurrent activity).
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.producer_cursor.load(Ordering::Relaxed);
        let head = self.consumer_cursor.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence the next claim will receive; the sync barrier snapshots this.
    #[inline]
    pub fn producer_cursor(&self) -> u64 {
        self.producer_cursor.load(Ordering::Acquire)
    }

    /// Sequence the consumer will drain next; `>= barrier` means everything
    /// published before the barrier snapshot has been encoded and written.
    #[inline]
    pub fn consumer_cursor(&self) -> u64 {
        self.consumer_cursor.load(Ordering::Acquire)
    }

    /// The wake handle producers signal after publishing, when the idle
    /// strategy parks.
    #[inline]
    pub(crate) fn wake_handle(&self) -> Option<Arc<WakeHandle>> {
        self.wake.clone()
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Claim the next slot for writing. Returns `None` if the ring is full
    /// for this lap (the drop decision belongs to the caller's policy).
    pub fn try_claim(&self) -> Option<Claim<'_>> {
        loop {
            let cursor = self.producer_cursor.load(Ordering::Relaxed);
            let slot = &self.slots[(cursor & self.mask) as usize];
            let seq = slot.sequence.load(Ordering::Acquire);

            debug_assert_slot_state!(seq, cursor, self.capacity);

            if seq == cursor {
                // Slot is empty for this lap; race other producers for it.
                if self
                    .producer_cursor
                    .compare_exchange_weak(cursor, cursor + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    return Some(Claim {
                        ring: self,
                        slot,
                        sequence: cursor,
                    });
                }
                // Lost the race; reload the cursor and try again.
            } else if seq < cursor {
                // The consumer has not released this slot from the previous
                // lap: the ring is full.
                self.stats.add_claim_contention();
                return None;
            }
            // seq > cursor: our cursor read was stale; retry.
        }
    }

    /// Claim the next slot, spinning on adaptive backoff until one frees.
    /// No timeout; callers needing cancellation must wrap externally.
    pub fn claim_blocking(&self) -> Claim<'_> {
        let mut idler = Idler::new(IdleStrategy::Progressive, None);
        loop {
            if let Some(claim) = self.try_claim() {
                return claim;
            }
            idler.idle();
        }
    }

    // ---------------------------------------------------------------------
    // CONSUMER API (single consumer thread per ring)
    // ---------------------------------------------------------------------

    /// Drain up to `max` published records, handing each to `f` before the
    /// slot is reset and released.
    ///
    /// Must only be called from the ring's single consumer thread.
    pub fn consume_batch<F>(&self, max: usize, f: &mut F) -> usize
    where
        F: FnMut(&mut Record),
    {
        let mut count = 0;
        while count < max {
            let cursor = self.consumer_cursor.load(Ordering::Relaxed);
            let slot = &self.slots[(cursor & self.mask) as usize];
            if slot.sequence.load(Ordering::Acquire) != cursor + 1 {
                break;
            }

            // SAFETY: the Acquire load above observed the producer's Release
            // publish, so the record is fully written and the producer has
            // relinquished the slot. Only this consumer touches it until the
            // Release store below frees it for a future lap.
            let record = unsafe { &mut *slot.record.get() };
            f(record);
            record.reset();

            let released = cursor + self.capacity;
            debug_assert_slot_release!(released, cursor, self.capacity);
            slot.sequence.store(released, Ordering::Release);

            debug_assert_monotonic!("consumer", cursor, cursor + 1);
            self.consumer_cursor.store(cursor + 1, Ordering::Release);
            count += 1;
        }

        if count > 0 {
            self.stats.add_consumed(count as u64);
        }
        count
    }

    /// Drain until the ring is empty, waiting out claims that are still
    /// between claim and publish.
    pub fn drain<F>(&self, f: &mut F) -> usize
    where
        F: FnMut(&mut Record),
    {
        let mut idler = Idler::new(IdleStrategy::Progressive, None);
        let mut total = 0;
        loop {
            let n = self.consume_batch(usize::MAX, f);
            total += n;

            let len = self.len();
            debug_assert_bounded_count!(len as u64, self.capacity);
            if len == 0 {
                return total;
            }
            if n > 0 {
                idler.reset();
            } else {
                // A claim is in flight but unpublished; wait for it.
                idler.idle();
            }
        }
    }
}

/// Exclusive claim on one ring slot, publish-on-drop.
///
/// The producer fills [`record`](Claim::record) and calls
/// [`publish`](Claim::publish) (or just drops the guard). Publication can not
/// be skipped: a claimed sequence the consumer never receives would stall the
/// ring.
pub struct Claim<'a> {
    ring: &'a Ring,
    slot: &'a Slot,
    sequence: u64,
}

impl Claim<'_> {
    /// The slot's record, reset by the consumer after its previous lap.
    #[inline]
    pub fn record(&mut self) -> &mut Record {
        // SAFETY: between the CAS claim and the Release publish in drop, this
        // guard is the slot's only owner.
        unsafe { &mut *self.slot.record.get() }
    }

    /// Publishes the record to the consumer. Equivalent to dropping the
    /// guard; spelled out at call sites for readability.
    #[inline]
    pub fn publish(self) {}
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.slot
            .sequence
            .store(self.sequence + 1, Ordering::Release);
        self.ring.stats.add_published();
        if let Some(wake) = &self.ring.wake {
            wake.wake();
        }
    }
}
