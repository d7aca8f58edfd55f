use super::clock::TimeCache;
use super::{Encoder, EncoderConfig, TimeFormat};
use crate::field::{AnyValue, FieldValue};
use crate::{Field, Level, Record};
use std::fmt::Write as _;
use std::sync::Arc;

/// Human-oriented text encoder:
/// `timestamp LEVEL logger [caller] message k=v ...\n`, stack lines appended
/// with a two-space prefix.
///
/// Every segment a caller can influence is sanitized so no key or value can
/// introduce an unprefixed newline: one record is always exactly one
/// terminated line plus prefixed stack continuations.
pub struct ConsoleEncoder {
    config: EncoderConfig,
    color: bool,
    cache: Arc<TimeCache>,
    scratch: String,
}

/// ANSI color per level: cool for quiet levels, red for loud.
fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => "\x1b[35m",
        Level::Info => "\x1b[34m",
        Level::Warn => "\x1b[33m",
        Level::Error | Level::DPanic | Level::Panic | Level::Fatal => "\x1b[31m",
    }
}

const KEY_COLOR: &str = "\x1b[36m";
const COLOR_RESET: &str = "\x1b[0m";

impl ConsoleEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            color: false,
            cache: Arc::new(TimeCache::new()),
            scratch: String::new(),
        }
    }

    /// Enables ANSI colorization of the level and field keys.
    pub fn with_color(mut self) -> Self {
        self.color = true;
        self
    }

    fn append_value(&mut self, value: &FieldValue, buf: &mut Vec<u8>) {
        let mut digits = itoa::Buffer::new();
        match value {
            FieldValue::Str(s) => append_text(s, buf),
            // The payload is never read.
            FieldValue::Secret(_) => buf.extend_from_slice(b"[REDACTED]"),
            FieldValue::Int64(v) => buf.extend_from_slice(digits.format(*v).as_bytes()),
            FieldValue::Uint64(v) => buf.extend_from_slice(digits.format(*v).as_bytes()),
            FieldValue::Float64(v) => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{v}");
                buf.extend_from_slice(self.scratch.as_bytes());
            }
            FieldValue::Bool(true) => buf.extend_from_slice(b"true"),
            FieldValue::Bool(false) => buf.extend_from_slice(b"false"),
            FieldValue::Duration(ns) => buf.extend_from_slice(digits.format(*ns).as_bytes()),
            FieldValue::Time(ns) => self.cache.format_into(*ns, buf),
            FieldValue::Bytes(bytes) => {
                buf.extend_from_slice(b"0x");
                const HEX: &[u8; 16] = b"0123456789abcdef";
                for b in bytes {
                    buf.push(HEX[(b >> 4) as usize]);
                    buf.push(HEX[(b & 0x0f) as usize]);
                }
            }
            FieldValue::Error(Some(err)) => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{err}");
                append_text(&self.scratch, buf);
            }
            FieldValue::Error(None) => buf.extend_from_slice(b"<nil>"),
            FieldValue::Stringer(s) => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{s}");
                append_text(&self.scratch, buf);
            }
            FieldValue::Object(AnyValue::Errors(errs)) => {
                self.scratch.clear();
                for (i, err) in errs.iter().enumerate() {
                    if i > 0 {
                        self.scratch.push(';');
                    }
                    let _ = write!(self.scratch, "{err}");
                }
                append_text(&self.scratch, buf);
            }
            FieldValue::Object(AnyValue::Debug(v)) => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{v:?}");
                append_text(&self.scratch, buf);
            }
        }
    }

    fn append_field(&mut self, field: &Field, buf: &mut Vec<u8>) {
        buf.push(b' ');
        if self.color {
            buf.extend_from_slice(KEY_COLOR.as_bytes());
        }
        append_sanitized_key(&field.key, buf);
        if self.color {
            buf.extend_from_slice(COLOR_RESET.as_bytes());
        }
        buf.push(b'=');
        self.append_value(&field.value, buf);
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&mut self, record: &Record, buf: &mut Vec<u8>) {
        match self.config.time_format {
            TimeFormat::UnixNanos => {
                let mut digits = itoa::Buffer::new();
                buf.extend_from_slice(digits.format(record.timestamp).as_bytes());
            }
            TimeFormat::Rfc3339Nano => self.cache.format_into(record.timestamp, buf),
        }

        buf.push(b' ');
        if self.color {
            buf.extend_from_slice(level_color(record.level).as_bytes());
        }
        buf.extend_from_slice(record.level.as_str_upper().as_bytes());
        if self.color {
            buf.extend_from_slice(COLOR_RESET.as_bytes());
        }

        if !record.logger_name.is_empty() {
            buf.push(b' ');
            append_flat(&record.logger_name, buf);
        }

        if !record.caller.is_empty() {
            buf.push(b' ');
            buf.push(b'[');
            append_flat(&record.caller, buf);
            buf.push(b']');
        }

        buf.push(b' ');
        append_flat(&record.message, buf);

        for field in record.fields() {
            self.append_field(field, buf);
        }
        buf.push(b'\n');

        // Stack continuation lines; the two-space prefix is what separates
        // them from record boundaries.
        for line in record.stack.lines() {
            buf.extend_from_slice(b"  ");
            append_flat(line, buf);
            buf.push(b'\n');
        }
    }

    fn boxed_clone(&self) -> Box<dyn Encoder> {
        Box::new(Self {
            config: self.config.clone(),
            color: self.color,
            cache: Arc::clone(&self.cache),
            scratch: String::new(),
        })
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Keys: anything outside `[A-Za-z0-9._-]` becomes `_`; an empty key becomes
/// the literal `invalid_key`. Mandatory to prevent log injection through key
/// names.
fn append_sanitized_key(key: &str, buf: &mut Vec<u8>) {
    if key.is_empty() {
        buf.extend_from_slice(b"invalid_key");
        return;
    }
    for &b in key.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-') {
            buf.push(b);
        } else {
            buf.push(b'_');
        }
    }
}

fn is_control(b: u8) -> bool {
    b < 0x20 || b == 0x7f
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.bytes()
            .any(|b| b == b' ' || b == b'"' || b == b'=' || is_control(b))
}

/// Values: bare when harmless, otherwise quoted with aggressive substitution
/// so nothing inside can terminate the line or fake a `key=` boundary.
fn append_text(s: &str, buf: &mut Vec<u8>) {
    if !needs_quoting(s) {
        buf.extend_from_slice(s.as_bytes());
        return;
    }
    buf.push(b'"');
    for &b in s.as_bytes() {
        match b {
            b'"' => buf.extend_from_slice(b"\\\""),
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'=' => buf.push(b'_'),
            _ if is_control(b) => buf.push(b'_'),
            _ => buf.push(b),
        }
    }
    buf.push(b'"');
}

/// Fixed segments (message, logger name, caller, stack lines) stay unquoted;
/// controls are substituted so they cannot break the line structure.
fn append_flat(s: &str, buf: &mut Vec<u8>) {
    for &b in s.as_bytes() {
        if is_control(b) {
            buf.push(b'_');
        } else {
            buf.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level, message: &str, fields: Vec<Field>) -> Record {
        let mut rec = Record::new();
        rec.level = level;
        rec.message.push_str(message);
        rec.timestamp = 1_700_000_000_000_000_000;
        for f in fields {
            rec.add_field(f);
        }
        rec
    }

    fn encode(rec: &Record) -> String {
        let mut enc =
            ConsoleEncoder::new(EncoderConfig::default().with_time_format(TimeFormat::UnixNanos));
        let mut buf = Vec::new();
        enc.encode(rec, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_basic_line() {
        let rec = record(Level::Info, "ready", vec![Field::int64("port", 8080)]);
        assert_eq!(encode(&rec), "1700000000000000000 INFO ready port=8080\n");
    }

    #[test]
    fn test_logger_and_caller_segments() {
        let mut rec = record(Level::Warn, "m", vec![]);
        rec.logger_name.push_str("svc.api");
        rec.caller.push_str("handler.rs:42");
        assert_eq!(encode(&rec), "1700000000000000000 WARN svc.api [handler.rs:42] m\n");
    }

    #[test]
    fn test_newline_injection_is_neutralized() {
        let rec = record(
            Level::Info,
            "audit",
            vec![Field::str("user", "alice\nlevel=fatal msg=\"BREACH\"")],
        );
        let line = encode(&rec);

        // Exactly one terminated line; no line starts with the forged text.
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.ends_with('\n'));
        assert!(!line.lines().any(|l| l.starts_with("level=fatal")));
        // The embedded newline and '=' were substituted inside the quotes.
        assert!(line.contains("user=\"alice_level_fatal msg_\\\"BREACH\\\"\""));
    }

    #[test]
    fn test_key_sanitization() {
        let rec = record(
            Level::Info,
            "m",
            vec![
                Field::str("ok.key_1-x", "v"),
                Field::str("bad key\n=", "v"),
                Field::str("", "v"),
            ],
        );
        let line = encode(&rec);
        assert!(line.contains(" ok.key_1-x=v"));
        assert!(line.contains(" bad_key__=v"));
        assert!(line.contains(" invalid_key=v"));
    }

    #[test]
    fn test_secret_and_bytes() {
        let rec = record(
            Level::Info,
            "m",
            vec![
                Field::secret("password", "s3cr3t"),
                Field::bytes("id", vec![0xde, 0xad, 0x01]),
            ],
        );
        let line = encode(&rec);
        assert!(line.contains("password=[REDACTED]"));
        assert!(!line.contains("s3cr3t"));
        assert!(line.contains("id=0xdead01"));
    }

    #[test]
    fn test_quoting_rules() {
        let rec = record(
            Level::Info,
            "m",
            vec![
                Field::str("bare", "no-quoting-needed"),
                Field::str("spaced", "two words"),
                Field::str("empty", ""),
            ],
        );
        let line = encode(&rec);
        assert!(line.contains(" bare=no-quoting-needed"));
        assert!(line.contains(" spaced=\"two words\""));
        assert!(line.contains(" empty=\"\""));
    }

    #[test]
    fn test_stack_lines_are_prefixed() {
        let mut rec = record(Level::Error, "boom", vec![]);
        rec.stack.push_str("0: main\n1: start");
        let line = encode(&rec);
        let lines: Vec<_> = line.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "  0: main");
        assert_eq!(lines[2], "  1: start");
    }

    #[test]
    fn test_message_newline_substituted() {
        let rec = record(Level::Info, "line1\nline2", vec![]);
        let line = encode(&rec);
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("line1_line2"));
    }

    #[test]
    fn test_colors_wrap_level_and_keys() {
        let mut enc = ConsoleEncoder::new(
            EncoderConfig::default().with_time_format(TimeFormat::UnixNanos),
        )
        .with_color();
        let rec = record(Level::Error, "m", vec![Field::bool("up", false)]);
        let mut buf = Vec::new();
        enc.encode(&rec, &mut buf);
        let line = String::from_utf8(buf).unwrap();
        assert!(line.contains("\x1b[31mERROR\x1b[0m"));
        assert!(line.contains("\x1b[36mup\x1b[0m=false"));
    }
}
