//! Debug assertion macros for ring transport invariants.
//!
//! Active only in debug builds (`debug_assert!`), so release builds pay
//! nothing. Used by `Ring` and the sync barrier.

/// Assert that the in-flight record count never exceeds capacity.
///
/// Invariant: `0 ≤ (producer_cursor − consumer_cursor) ≤ capacity`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "ring holds {} records, exceeding capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that a cursor only moves forward.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} cursor decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that a slot sequence is in one of its three legal states for the
/// cursor observing it: empty for this lap, published, or owned by a prior
/// lap that the consumer has not yet released.
macro_rules! debug_assert_slot_state {
    ($seq:expr, $cursor:expr, $capacity:expr) => {
        debug_assert!(
            $seq == $cursor
                || $seq == $cursor + 1
                || $seq.wrapping_add($capacity) > $cursor,
            "slot sequence {} is unreachable from cursor {}",
            $seq,
            $cursor
        )
    };
}

/// Assert that the consumer releases a slot to the correct future lap.
macro_rules! debug_assert_slot_release {
    ($new_seq:expr, $cursor:expr, $capacity:expr) => {
        debug_assert!(
            $new_seq == $cursor + $capacity,
            "slot released to sequence {} instead of {}",
            $new_seq,
            $cursor + $capacity
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_slot_release;
pub(crate) use debug_assert_slot_state;
