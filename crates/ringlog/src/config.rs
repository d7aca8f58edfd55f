use crate::autoscale::AutoscaleConfig;
use crate::logger::{ErrorHandler, ExitCallback, Hook, PanicCallback};
use crate::{
    Architecture, BackpressurePolicy, Encoder, Error, IdleStrategy, JsonEncoder, Level, Logger,
    Result, Sampler, WriteSyncer,
};
use crate::encoder::EncoderConfig;
use std::sync::Arc;

/// Logger configuration, validated at [`build`](Config::build) time.
///
/// Defaults: `Info` level, single ring of 8192 slots, `DropOnFull`,
/// progressive idling, JSON encoder. Sinks have no default; an empty sink
/// list is rejected.
pub struct Config {
    pub(crate) level: Level,
    pub(crate) capacity: usize,
    pub(crate) architecture: Architecture,
    pub(crate) num_shards: usize,
    pub(crate) policy: BackpressurePolicy,
    pub(crate) idle: IdleStrategy,
    pub(crate) encoder: Box<dyn Encoder>,
    pub(crate) sinks: Vec<Arc<dyn WriteSyncer>>,
    pub(crate) sampler: Option<Arc<dyn Sampler>>,
    pub(crate) add_caller: bool,
    pub(crate) caller_skip: usize,
    pub(crate) stacktrace_min_level: Option<Level>,
    pub(crate) development: bool,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) autoscaling: Option<AutoscaleConfig>,
    pub(crate) max_record_bytes: Option<usize>,
    pub(crate) batch_hint: usize,
    pub(crate) error_handler: Option<ErrorHandler>,
    pub(crate) panic_callback: Option<PanicCallback>,
    pub(crate) exit_callback: Option<ExitCallback>,
}

/// Largest power of two not exceeding the machine's parallelism; the default
/// shard count for the sharded shape.
fn default_shards() -> usize {
    let n = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let shards = if n.is_power_of_two() { n } else { n.next_power_of_two() / 2 };
    shards.max(2)
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            level: Level::Info,
            capacity: 8192,
            architecture: Architecture::SingleRing,
            num_shards: default_shards(),
            policy: BackpressurePolicy::default(),
            idle: IdleStrategy::default(),
            encoder: Box::new(JsonEncoder::new(EncoderConfig::default())),
            sinks: Vec::new(),
            sampler: None,
            add_caller: false,
            caller_skip: 0,
            stacktrace_min_level: None,
            development: false,
            hooks: Vec::new(),
            autoscaling: None,
            max_record_bytes: None,
            batch_hint: 64,
            error_handler: None,
            panic_callback: None,
            exit_callback: None,
        }
    }

    /// Minimum level that passes the gate.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Ring slot count; must be a power of two ≥ 2.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Shard count for the sharded shape; must be a power of two.
    pub fn with_num_shards(mut self, num_shards: usize) -> Self {
        self.num_shards = num_shards;
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_idle_strategy(mut self, idle: IdleStrategy) -> Self {
        self.idle = idle;
        self
    }

    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Adds a sink; more than one fans out in order.
    pub fn with_sink(mut self, sink: Arc<dyn WriteSyncer>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Records the call site of each log call as `file:line`.
    pub fn with_caller(mut self) -> Self {
        self.add_caller = true;
        self
    }

    /// Extra stack frames to trim from captured stacks.
    pub fn with_caller_skip(mut self, skip: usize) -> Self {
        self.caller_skip = skip;
        self
    }

    /// Captures a stack trace for records at or above `level`.
    pub fn with_stacktrace(mut self, level: Level) -> Self {
        self.stacktrace_min_level = Some(level);
        self
    }

    /// Development mode: `DPanic` triggers the panic callback, and stack
    /// capture defaults to `Error` unless set explicitly.
    pub fn development(mut self) -> Self {
        self.development = true;
        self
    }

    /// Appends a hook; hooks run on consumer threads in registration order.
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_autoscaling(mut self, autoscaling: AutoscaleConfig) -> Self {
        self.autoscaling = Some(autoscaling);
        self
    }

    /// Optional cap on the encoded size of one record; larger records are
    /// reported through the error handler and not written.
    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = Some(max);
        self
    }

    /// Upper bound on records drained per consumer batch.
    pub fn with_batch_hint(mut self, hint: usize) -> Self {
        self.batch_hint = hint;
        self
    }

    /// Replaces the default stderr error handler.
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Invoked on the producer thread after publishing at `Panic` (and
    /// `DPanic` in development mode).
    pub fn with_panic_callback(mut self, callback: PanicCallback) -> Self {
        self.panic_callback = Some(callback);
        self
    }

    /// Invoked after publish + sync at `Fatal`.
    pub fn with_exit_callback(mut self, callback: ExitCallback) -> Self {
        self.exit_callback = Some(callback);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.capacity < 2 || !self.capacity.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "capacity must be a power of two >= 2, got {}",
                self.capacity
            )));
        }
        if self.num_shards == 0 || !self.num_shards.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "num_shards must be a power of two >= 1, got {}",
                self.num_shards
            )));
        }
        if self.sinks.is_empty() {
            return Err(Error::InvalidConfig("at least one sink is required".into()));
        }
        if self.batch_hint == 0 {
            return Err(Error::InvalidConfig("batch_hint must be >= 1".into()));
        }
        if let Some(max) = self.max_record_bytes {
            if max == 0 {
                return Err(Error::InvalidConfig("max_record_bytes must be >= 1".into()));
            }
        }
        if let Some(auto) = &self.autoscaling {
            auto.validate()?;
        }
        Ok(())
    }

    /// Effective shard count for the configured architecture.
    pub(crate) fn effective_shards(&self) -> usize {
        match self.architecture {
            Architecture::SingleRing => 1,
            Architecture::Sharded => self.num_shards,
        }
    }

    /// Effective stack capture threshold: explicit setting wins; development
    /// mode defaults to `Error`.
    pub(crate) fn effective_stacktrace_level(&self) -> Option<Level> {
        self.stacktrace_min_level
            .or(self.development.then_some(Level::Error))
    }

    /// Validates and constructs the logger. No consumer threads are spawned
    /// until [`Logger::start`].
    pub fn build(self) -> Result<Logger> {
        Logger::from_config(self)
    }
}
