//! RingLog - High-Throughput Structured Logging on a Lock-Free Ring Transport
//!
//! Log records travel from any number of producer threads to dedicated
//! consumer threads through an MPSC ring buffer (single ring or one ring per
//! shard), decoupling submission from encoding and I/O.
//!
//! # Key Features
//!
//! - Per-slot sequence handoff: the slot atomic is the only synchronization
//!   between producer and consumer
//! - In-place record storage with reset-on-consume (no steady-state
//!   allocation on the hot path)
//! - Pluggable encoders (NDJSON, console text) with unconditional secret
//!   redaction and injection-resistant output
//! - Token-bucket and reservoir samplers, caller/stack capture gates
//! - `sync()` barrier: everything logged before the call is in the sinks
//!   when it returns
//! - Optional autoscaling between single-ring and sharded transports driven
//!   by observed write rate
//!
//! # Example
//!
//! ```
//! use ringlog::{Config, Field, Level, TestSink};
//!
//! let sink = TestSink::new();
//! let logger = Config::new()
//!     .with_level(Level::Info)
//!     .with_capacity(1024)
//!     .with_sink(sink.clone())
//!     .build()
//!     .unwrap();
//!
//! logger.start().unwrap();
//! logger.info("service ready", [Field::str("addr", "0.0.0.0:8080")]);
//! logger.sync().unwrap();
//! assert_eq!(sink.lines().len(), 1);
//! logger.close().unwrap();
//! ```

mod autoscale;
mod caller;
mod config;
mod encoder;
mod error;
mod field;
mod idle;
mod invariants;
mod level;
mod logger;
mod record;
mod ring;
mod sampler;
mod sink;
mod stats;
mod transport;

pub use autoscale::AutoscaleConfig;
pub use config::Config;
pub use encoder::{ConsoleEncoder, Encoder, EncoderConfig, JsonEncoder, TimeCache, TimeFormat};
pub use error::{Error, Result};
pub use field::{AnyValue, DynError, Field, FieldValue};
pub use idle::{IdleStrategy, Idler, WakeHandle};
pub use level::Level;
pub use logger::{ErrorHandler, ExitCallback, Hook, Logger, PanicCallback};
pub use record::{Record, MAX_FIELDS};
pub use ring::{Claim, Ring};
pub use sampler::{
    ReservoirSampler, Sampler, SamplerStats, SamplingDecision, TokenBucketSampler,
};
pub use sink::{
    BufferedSink, DiscardSink, FileSink, MultiSink, StreamSink, TestSink, WriteSyncer,
    DEFAULT_BUFFER_SIZE,
};
pub use stats::{Stats, StatsSnapshot};
pub use transport::{Architecture, BackpressurePolicy, Transport};
