use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::io::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock as Unix nanoseconds (negative before the epoch).
pub(crate) fn now_nanos() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

/// Appends `nanos` as RFC3339 with fixed nanosecond precision.
pub(crate) fn format_rfc3339(nanos: i64, out: &mut Vec<u8>) {
    let dt: DateTime<Utc> = DateTime::from_timestamp_nanos(nanos);
    // Writing to a Vec cannot fail.
    let _ = write!(out, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.9fZ"));
}

/// Tolerance within which a cached rendering may stand in for the exact one.
const TOLERANCE_NANOS: i64 = 500_000; // 500µs

/// Shared RFC3339 rendering cache.
///
/// Timestamp formatting dominates encode cost when records arrive in bursts;
/// consecutive records land within microseconds of each other, so the last
/// rendering is almost always reusable. The cache never yields a value more
/// than 500µs from the requested instant.
///
/// One instance is created per encoder and shared across its consumer-thread
/// clones; there is no process-wide singleton.
#[derive(Debug, Default)]
pub struct TimeCache {
    inner: Mutex<CacheSlot>,
}

#[derive(Debug, Default)]
struct CacheSlot {
    nanos: i64,
    text: Vec<u8>,
}

impl TimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the RFC3339 rendering of `nanos`, reusing the cached text
    /// when within tolerance.
    pub fn format_into(&self, nanos: i64, out: &mut Vec<u8>) {
        let mut slot = self.inner.lock();
        if !slot.text.is_empty() && (nanos - slot.nanos).abs() <= TOLERANCE_NANOS {
            out.extend_from_slice(&slot.text);
            return;
        }
        slot.text.clear();
        format_rfc3339(nanos, &mut slot.text);
        slot.nanos = nanos;
        out.extend_from_slice(&slot.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_fixed_nanos() {
        let mut out = Vec::new();
        format_rfc3339(1_700_000_000_123_456_789, &mut out);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2023-11-14T22:13:20.123456789Z"
        );
    }

    #[test]
    fn test_epoch_renders() {
        let mut out = Vec::new();
        format_rfc3339(0, &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "1970-01-01T00:00:00.000000000Z");
    }

    #[test]
    fn test_cache_reuses_within_tolerance() {
        let cache = TimeCache::new();
        let base = 1_700_000_000_000_000_000;

        let mut first = Vec::new();
        cache.format_into(base, &mut first);

        // 400µs later: within tolerance, the cached text is reused verbatim.
        let mut second = Vec::new();
        cache.format_into(base + 400_000, &mut second);
        assert_eq!(first, second);

        // 600µs later: outside tolerance, the exact value is formatted.
        let mut third = Vec::new();
        cache.format_into(base + 600_000, &mut third);
        assert_ne!(first, third);
    }

    #[test]
    fn test_cache_never_exceeds_tolerance() {
        let cache = TimeCache::new();
        let base = 1_700_000_000_000_000_000i64;

        for offset in [0i64, 123_000, 499_999, 500_001, 2_000_000] {
            let mut out = Vec::new();
            cache.format_into(base + offset, &mut out);

            let text = String::from_utf8(out).unwrap();
            let parsed = chrono::DateTime::parse_from_rfc3339(&text).unwrap();
            let rendered_nanos = parsed.timestamp_nanos_opt().unwrap();
            assert!(
                (rendered_nanos - (base + offset)).abs() <= 500_000,
                "cache drifted {}ns",
                rendered_nanos - (base + offset)
            );
        }
    }
}
