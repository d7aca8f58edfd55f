use crate::{Field, Level};
use smallvec::SmallVec;

/// Maximum number of fields one record can carry.
pub const MAX_FIELDS: usize = 32;

/// One log entry traveling through the transport.
///
/// Records are owned by the ring: each slot holds one pre-allocated `Record`
/// that producers fill in place and the consumer [`reset`](Record::reset)s
/// after encoding. Strings and the inline field array keep their capacity
/// across laps, so a warmed-up ring stops allocating on the hot path.
pub struct Record {
    pub level: Level,
    pub message: String,
    /// Empty unless the logger was [`named`](crate::Logger::named).
    pub logger_name: String,
    /// `basename:line` of the log call site; empty when caller capture is off.
    pub caller: String,
    /// Multi-line stack trace; empty unless stack capture triggered.
    pub stack: String,
    /// Capture instant, Unix nanoseconds, taken on the producer thread.
    pub timestamp: i64,
    fields: SmallVec<[Field; MAX_FIELDS]>,
}

impl Record {
    pub(crate) fn new() -> Self {
        Self {
            level: Level::Info,
            message: String::new(),
            logger_name: String::new(),
            caller: String::new(),
            stack: String::new(),
            timestamp: 0,
            fields: SmallVec::new(),
        }
    }

    /// Appends a field, returning `false` (record unchanged) once the
    /// 32-field capacity is reached.
    #[inline]
    pub fn add_field(&mut self, field: Field) -> bool {
        if self.fields.len() >= MAX_FIELDS {
            return false;
        }
        self.fields.push(field);
        true
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Clears the record for slot reuse, retaining string and field capacity.
    pub fn reset(&mut self) {
        self.level = Level::Info;
        self.message.clear();
        self.logger_name.clear();
        self.caller.clear();
        self.stack.clear();
        self.timestamp = 0;
        self.fields.clear();
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}
