//! Caller and stack capture.
//!
//! Capture happens eagerly on the producer thread at log time, so the
//! consumer never needs the producer's stack context. The caller frame comes
//! from `#[track_caller]` propagation (see the `Logger` entry points); the
//! stack comes from `std::backtrace`.

use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::panic::Location;

/// Renders a caller location as `basename:line` into `out`.
pub(crate) fn format_caller(location: &Location<'_>, out: &mut String) {
    let file = location.file();
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    out.push_str(base);
    out.push(':');
    // Writing to a String cannot fail.
    let _ = write!(out, "{}", location.line());
}

/// Captures a multi-frame stack trace into `out`, trimming the first `skip`
/// frames. Leaves `out` empty when the runtime cannot produce a backtrace;
/// that is not an error.
pub(crate) fn capture_stack(skip: usize, out: &mut String) {
    let rendered = Backtrace::force_capture().to_string();
    if rendered.starts_with("unsupported") || rendered.starts_with("disabled") {
        return;
    }

    // Frames render as a numbered line optionally followed by an indented
    // "at file:line" continuation; count numbered lines to apply the skip.
    let mut frames_seen = 0usize;
    for line in rendered.lines() {
        let is_frame_start = line
            .trim_start()
            .split_once(':')
            .is_some_and(|(n, _)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if is_frame_start {
            frames_seen += 1;
        }
        if frames_seen > skip {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_caller_uses_basename() {
        let location = Location::caller();
        let mut out = String::new();
        format_caller(location, &mut out);

        assert!(out.starts_with("caller.rs:"), "got {out}");
        let line: u32 = out.split(':').nth(1).unwrap().parse().unwrap();
        assert!(line > 0);
    }

    #[test]
    fn test_capture_stack_has_frames() {
        let mut out = String::new();
        capture_stack(0, &mut out);
        // Backtraces can be unavailable in some environments; when present
        // they must span multiple lines.
        if !out.is_empty() {
            assert!(out.lines().count() > 1);
        }
    }

    #[test]
    fn test_skip_trims_leading_frames() {
        let mut full = String::new();
        capture_stack(0, &mut full);
        if full.is_empty() {
            return;
        }

        let mut trimmed = String::new();
        capture_stack(2, &mut trimmed);
        assert!(trimmed.lines().count() < full.lines().count());
    }
}
