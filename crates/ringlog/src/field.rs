use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shared error payload carried by `Error` and `Object` field variants.
///
/// `Arc` rather than `Box` so that fields captured by `Logger::with` hold a
/// strong reference and remain observable from the consumer thread for the
/// lifetime of every record that carries them.
pub type DynError = Arc<dyn std::error::Error + Send + Sync>;

/// One key/value pair in a [`Record`](crate::Record).
///
/// The key is owned; dynamic payloads are `Arc`-held so `Field` is `Clone`
/// and cloning a scope field costs one reference count bump plus the key
/// string.
#[derive(Clone)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

/// Tagged-union field value.
#[derive(Clone)]
pub enum FieldValue {
    Str(String),
    /// Same representation as `Str`, but every encoder emits the literal
    /// `[REDACTED]` and never reads the payload.
    Secret(String),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Bool(bool),
    /// Signed nanosecond count.
    Duration(i64),
    /// Absolute instant as Unix nanoseconds.
    Time(i64),
    Bytes(Vec<u8>),
    /// `None` encodes as JSON `null`.
    Error(Option<DynError>),
    /// Rendered lazily at encode time on the consumer thread.
    Stringer(Arc<dyn fmt::Display + Send + Sync>),
    /// Opaque value; encoders fall back to a generic renderer.
    Object(AnyValue),
}

/// Payload of the `Object` variant.
#[derive(Clone)]
pub enum AnyValue {
    /// Encodes as an array of error messages.
    Errors(Vec<DynError>),
    /// Generic fallback, rendered with `fmt::Debug`.
    Debug(Arc<dyn fmt::Debug + Send + Sync>),
}

impl Field {
    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: FieldValue::Str(value.into()) }
    }

    /// A text field whose value is redacted by every encoder.
    pub fn secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: FieldValue::Secret(value.into()) }
    }

    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self { key: key.into(), value: FieldValue::Int64(value) }
    }

    pub fn uint64(key: impl Into<String>, value: u64) -> Self {
        Self { key: key.into(), value: FieldValue::Uint64(value) }
    }

    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self { key: key.into(), value: FieldValue::Float64(value) }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self { key: key.into(), value: FieldValue::Bool(value) }
    }

    /// Duration as signed nanoseconds; values beyond `i64::MAX` ns saturate.
    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        let nanos = i64::try_from(value.as_nanos()).unwrap_or(i64::MAX);
        Self::duration_ns(key, nanos)
    }

    pub fn duration_ns(key: impl Into<String>, nanos: i64) -> Self {
        Self { key: key.into(), value: FieldValue::Duration(nanos) }
    }

    /// Instant as Unix nanoseconds; pre-epoch times become negative.
    pub fn time(key: impl Into<String>, value: SystemTime) -> Self {
        let nanos = match value.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
        };
        Self::time_ns(key, nanos)
    }

    pub fn time_ns(key: impl Into<String>, unix_nanos: i64) -> Self {
        Self { key: key.into(), value: FieldValue::Time(unix_nanos) }
    }

    pub fn bytes(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: FieldValue::Bytes(value.into()) }
    }

    pub fn error<E>(key: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { key: key.into(), value: FieldValue::Error(Some(Arc::new(err))) }
    }

    /// An absent error; encodes as `null` in JSON.
    pub fn none_error(key: impl Into<String>) -> Self {
        Self { key: key.into(), value: FieldValue::Error(None) }
    }

    /// A value rendered with `Display` at encode time, on the consumer thread.
    pub fn stringer<S>(key: impl Into<String>, value: S) -> Self
    where
        S: fmt::Display + Send + Sync + 'static,
    {
        Self { key: key.into(), value: FieldValue::Stringer(Arc::new(value)) }
    }

    /// An opaque value rendered with the generic fallback.
    pub fn any<V>(key: impl Into<String>, value: V) -> Self
    where
        V: fmt::Debug + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            value: FieldValue::Object(AnyValue::Debug(Arc::new(value))),
        }
    }

    /// A list of errors; encodes as an array of messages.
    pub fn errors<E>(key: impl Into<String>, errs: Vec<E>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let errs = errs
            .into_iter()
            .map(|e| Arc::new(e) as DynError)
            .collect();
        Self { key: key.into(), value: FieldValue::Object(AnyValue::Errors(errs)) }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => write!(f, "Str({s:?})"),
            // Never leak the payload, not even through Debug.
            FieldValue::Secret(_) => write!(f, "Secret([REDACTED])"),
            FieldValue::Int64(v) => write!(f, "Int64({v})"),
            FieldValue::Uint64(v) => write!(f, "Uint64({v})"),
            FieldValue::Float64(v) => write!(f, "Float64({v})"),
            FieldValue::Bool(v) => write!(f, "Bool({v})"),
            FieldValue::Duration(ns) => write!(f, "Duration({ns}ns)"),
            FieldValue::Time(ns) => write!(f, "Time({ns})"),
            FieldValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            FieldValue::Error(Some(e)) => write!(f, "Error({e})"),
            FieldValue::Error(None) => write!(f, "Error(None)"),
            FieldValue::Stringer(_) => write!(f, "Stringer(..)"),
            FieldValue::Object(AnyValue::Errors(errs)) => {
                write!(f, "Errors({} errors)", errs.len())
            }
            FieldValue::Object(AnyValue::Debug(_)) => write!(f, "Object(..)"),
        }
    }
}
