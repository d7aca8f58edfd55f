use super::clock::TimeCache;
use super::{Encoder, EncoderConfig, TimeFormat};
use crate::field::{AnyValue, FieldValue};
use crate::{Field, Record};
use std::fmt::Write as _;
use std::sync::Arc;

/// NDJSON encoder: one JSON object per record, newline-terminated.
///
/// Key order is fixed: timestamp, level, optional logger, message, optional
/// caller, optional stack, then user fields in insertion order.
pub struct JsonEncoder {
    config: EncoderConfig,
    cache: Arc<TimeCache>,
    /// Reused for `Display`/`Debug` renderings; the only heap the encoder
    /// touches besides the output buffer.
    scratch: String,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            cache: Arc::new(TimeCache::new()),
            scratch: String::new(),
        }
    }

    fn append_time(&self, nanos: i64, buf: &mut Vec<u8>) {
        match self.config.time_format {
            TimeFormat::UnixNanos => {
                let mut digits = itoa::Buffer::new();
                buf.extend_from_slice(digits.format(nanos).as_bytes());
            }
            TimeFormat::Rfc3339Nano => {
                buf.push(b'"');
                self.cache.format_into(nanos, buf);
                buf.push(b'"');
            }
        }
    }

    fn append_display<T: std::fmt::Display + ?Sized>(&mut self, value: &T, buf: &mut Vec<u8>) {
        self.scratch.clear();
        let _ = write!(self.scratch, "{value}");
        buf.push(b'"');
        append_escaped(&self.scratch, buf);
        buf.push(b'"');
    }

    fn append_field(&mut self, field: &Field, buf: &mut Vec<u8>) {
        append_key(&field.key, buf);
        let mut digits = itoa::Buffer::new();
        match &field.value {
            FieldValue::Str(s) => {
                buf.push(b'"');
                append_escaped(s, buf);
                buf.push(b'"');
            }
            // The payload is never read.
            FieldValue::Secret(_) => buf.extend_from_slice(b"\"[REDACTED]\""),
            FieldValue::Int64(v) => buf.extend_from_slice(digits.format(*v).as_bytes()),
            FieldValue::Uint64(v) => buf.extend_from_slice(digits.format(*v).as_bytes()),
            FieldValue::Float64(v) => {
                if v.is_finite() {
                    // Display for f64 is the shortest round-trip form.
                    self.scratch.clear();
                    let _ = write!(self.scratch, "{v}");
                    buf.extend_from_slice(self.scratch.as_bytes());
                } else if v.is_nan() {
                    buf.extend_from_slice(b"\"NaN\"");
                } else if *v > 0.0 {
                    buf.extend_from_slice(b"\"+Inf\"");
                } else {
                    buf.extend_from_slice(b"\"-Inf\"");
                }
            }
            FieldValue::Bool(true) => buf.extend_from_slice(b"true"),
            FieldValue::Bool(false) => buf.extend_from_slice(b"false"),
            FieldValue::Duration(ns) => buf.extend_from_slice(digits.format(*ns).as_bytes()),
            FieldValue::Time(ns) => {
                buf.push(b'"');
                self.cache.format_into(*ns, buf);
                buf.push(b'"');
            }
            FieldValue::Bytes(bytes) => {
                buf.push(b'[');
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        buf.push(b',');
                    }
                    buf.extend_from_slice(digits.format(*b).as_bytes());
                }
                buf.push(b']');
            }
            FieldValue::Error(Some(err)) => self.append_display(err, buf),
            FieldValue::Error(None) => buf.extend_from_slice(b"null"),
            FieldValue::Stringer(s) => self.append_display(s.as_ref(), buf),
            FieldValue::Object(AnyValue::Errors(errs)) => {
                buf.push(b'[');
                for (i, err) in errs.iter().enumerate() {
                    if i > 0 {
                        buf.push(b',');
                    }
                    self.append_display(err, buf);
                }
                buf.push(b']');
            }
            FieldValue::Object(AnyValue::Debug(v)) => {
                self.scratch.clear();
                let _ = write!(self.scratch, "{v:?}");
                buf.push(b'"');
                append_escaped(&self.scratch, buf);
                buf.push(b'"');
            }
        }
    }
}

impl Encoder for JsonEncoder {
    fn encode(&mut self, record: &Record, buf: &mut Vec<u8>) {
        buf.push(b'{');

        append_key(&self.config.time_key, buf);
        self.append_time(record.timestamp, buf);

        buf.push(b',');
        append_key(&self.config.level_key, buf);
        buf.push(b'"');
        buf.extend_from_slice(record.level.as_str().as_bytes());
        buf.push(b'"');

        if !record.logger_name.is_empty() {
            buf.push(b',');
            append_key(&self.config.logger_key, buf);
            buf.push(b'"');
            append_escaped(&record.logger_name, buf);
            buf.push(b'"');
        }

        buf.push(b',');
        append_key(&self.config.message_key, buf);
        buf.push(b'"');
        append_escaped(&record.message, buf);
        buf.push(b'"');

        if !record.caller.is_empty() {
            buf.push(b',');
            append_key(&self.config.caller_key, buf);
            buf.push(b'"');
            append_escaped(&record.caller, buf);
            buf.push(b'"');
        }

        if !record.stack.is_empty() {
            buf.push(b',');
            append_key(&self.config.stack_key, buf);
            buf.push(b'"');
            append_escaped(&record.stack, buf);
            buf.push(b'"');
        }

        for field in record.fields() {
            buf.push(b',');
            self.append_field(field, buf);
        }

        buf.extend_from_slice(b"}\n");
    }

    fn boxed_clone(&self) -> Box<dyn Encoder> {
        Box::new(Self {
            config: self.config.clone(),
            cache: Arc::clone(&self.cache),
            scratch: String::new(),
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn append_key(key: &str, buf: &mut Vec<u8>) {
    buf.push(b'"');
    append_escaped(key, buf);
    buf.extend_from_slice(b"\":");
}

fn append_escaped(s: &str, buf: &mut Vec<u8>) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for &b in s.as_bytes() {
        match b {
            b'"' => buf.extend_from_slice(b"\\\""),
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            0x00..=0x1f => {
                buf.extend_from_slice(b"\\u00");
                buf.push(HEX[(b >> 4) as usize]);
                buf.push(HEX[(b & 0x0f) as usize]);
            }
            _ => buf.push(b),
        }
    }
}
