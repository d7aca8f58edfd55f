use crate::autoscale::{AutoscaleConfig, ScalePlanner, WindowSample};
use crate::caller;
use crate::encoder::now_nanos;
use crate::sampler::SamplingDecision;
use crate::sink::MultiSink;
use crate::transport::Transport;
use crate::{
    Architecture, BackpressurePolicy, Config, Encoder, Error, Field, IdleStrategy, Idler, Level,
    Record, Result, Ring, Sampler, Stats, StatsSnapshot, WriteSyncer,
};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Consumer-side callback, invoked per record before encoding.
///
/// Hooks run sequentially on the consumer thread of the shard that carried
/// the record and must not block; a panicking hook is recovered, reported,
/// and does not stop the consumer.
pub type Hook = Arc<dyn Fn(&Record) + Send + Sync>;

/// Receives runtime failures from consumer threads and `sync`.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Host callback fired after publishing at `Panic` / `DPanic` (dev mode).
pub type PanicCallback = Arc<dyn Fn() + Send + Sync>;

/// Host callback fired after publish + sync at `Fatal`.
pub type ExitCallback = Arc<dyn Fn(i32) + Send + Sync>;

const STATE_READY: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// A transport generation with its consumer threads.
struct Engine {
    transport: Arc<Transport>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

struct Lifecycle {
    engine: Option<Engine>,
    watcher: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

struct Core {
    level: Level,
    development: bool,
    capacity: usize,
    num_shards: usize,
    policy: BackpressurePolicy,
    idle: IdleStrategy,
    batch_hint: usize,
    max_record_bytes: Option<usize>,
    add_caller: bool,
    caller_skip: usize,
    stacktrace_min_level: Option<Level>,
    sampler: Option<Arc<dyn Sampler>>,
    hooks: Arc<[Hook]>,
    encoder: Box<dyn Encoder>,
    sink: Arc<dyn WriteSyncer>,
    error_handler: ErrorHandler,
    panic_callback: Option<PanicCallback>,
    exit_callback: Option<ExitCallback>,
    autoscaling: Option<AutoscaleConfig>,
    stats: Arc<Stats>,
    state: AtomicU8,
    /// Producers read the active transport here; the autoscaler swaps it
    /// under the write half. Contended only during a transition.
    transport: RwLock<Arc<Transport>>,
    /// Serializes start / close / scale transitions.
    lifecycle: Mutex<Lifecycle>,
}

/// The logger: level gate, sampler, capture, transport, lifecycle.
///
/// Cheap to clone; [`with`](Logger::with) and [`named`](Logger::named)
/// handles share the transport, sinks, sampler, and hooks of their parent.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Arc<str>,
    scope: Arc<[Field]>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Logger {
    pub(crate) fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(Stats::new());
        let shards = config.effective_shards();
        let stacktrace_min_level = config.effective_stacktrace_level();
        let transport = Arc::new(Transport::new(
            shards,
            config.capacity,
            config.policy,
            &config.idle,
            &stats,
        )?);

        let mut sinks = config.sinks;
        let sink: Arc<dyn WriteSyncer> = if sinks.len() == 1 {
            sinks.remove(0)
        } else {
            Arc::new(MultiSink::new(sinks))
        };

        let error_handler = config.error_handler.unwrap_or_else(|| {
            Arc::new(|err: &Error| eprintln!("{} {err}", err.code()))
        });

        let core = Core {
            level: config.level,
            development: config.development,
            capacity: config.capacity,
            num_shards: config.num_shards,
            policy: config.policy,
            idle: config.idle,
            batch_hint: config.batch_hint,
            max_record_bytes: config.max_record_bytes,
            add_caller: config.add_caller,
            caller_skip: config.caller_skip,
            stacktrace_min_level,
            sampler: config.sampler,
            hooks: config.hooks.into(),
            encoder: config.encoder,
            sink,
            error_handler,
            panic_callback: config.panic_callback,
            exit_callback: config.exit_callback,
            autoscaling: config.autoscaling,
            stats,
            state: AtomicU8::new(STATE_READY),
            transport: RwLock::new(transport),
            lifecycle: Mutex::new(Lifecycle { engine: None, watcher: None }),
        };

        Ok(Self {
            core: Arc::new(core),
            name: Arc::from(""),
            scope: Arc::from(Vec::new()),
        })
    }

    // ---------------------------------------------------------------------
    // Logging
    // ---------------------------------------------------------------------

    /// Fast pre-check for expensive field construction.
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        self.core.level.enabled(level) && self.core.state.load(Ordering::Acquire) != STATE_CLOSED
    }

    /// Submits one record. Returns without effect when the level gate, the
    /// sampler, or the backpressure policy rejects it, and always after
    /// `close`.
    #[track_caller]
    pub fn log<I>(&self, level: Level, message: &str, fields: I)
    where
        I: IntoIterator<Item = Field>,
    {
        let location = Location::caller();
        self.log_at(level, message, fields, location);
    }

    #[track_caller]
    pub fn debug<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Debug, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn info<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Info, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn warn<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Warn, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn error<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Error, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn dpanic<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::DPanic, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn panic<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Panic, message, fields, Location::caller());
    }

    #[track_caller]
    pub fn fatal<I: IntoIterator<Item = Field>>(&self, message: &str, fields: I) {
        self.log_at(Level::Fatal, message, fields, Location::caller());
    }

    fn log_at<I>(&self, level: Level, message: &str, fields: I, location: &Location<'_>)
    where
        I: IntoIterator<Item = Field>,
    {
        let core = &*self.core;
        if core.state.load(Ordering::Acquire) == STATE_CLOSED {
            return;
        }
        // Level gate first: a disabled call has no side effects at all.
        if !core.level.enabled(level) {
            return;
        }
        // The read guard is held across claim + publish: a transport swap
        // (write half) cannot land between them, so every claimed record is
        // published to a transport whose consumers are still alive.
        let transport = core.transport.read();

        // A record the full ring is about to drop must not advance the
        // sampler, so the fullness check comes first.
        if core.policy == BackpressurePolicy::DropOnFull && transport.is_full() {
            core.stats.add_dropped_full();
            return;
        }
        if let Some(sampler) = &core.sampler {
            if sampler.sample(level, message) == SamplingDecision::Drop {
                core.stats.add_sampled_out();
                return;
            }
        }

        let Some(mut claim) = transport.claim() else {
            core.stats.add_dropped_full();
            return;
        };

        {
            let rec = claim.record();
            rec.level = level;
            rec.timestamp = now_nanos();
            rec.message.push_str(message);
            rec.logger_name.push_str(&self.name);
            if core.add_caller {
                caller::format_caller(location, &mut rec.caller);
            }
            if core
                .stacktrace_min_level
                .is_some_and(|min| min.enabled(level))
            {
                caller::capture_stack(core.caller_skip, &mut rec.stack);
            }
            for field in self.scope.iter() {
                if !rec.add_field(field.clone()) {
                    break;
                }
            }
            for field in fields {
                if !rec.add_field(field) {
                    break;
                }
            }
        }
        claim.publish();
        drop(transport);

        // Level-triggered side effects run on the producer thread, after the
        // publish, so the record is guaranteed to be transported.
        if level.should_panic(core.development) {
            if let Some(callback) = &core.panic_callback {
                callback();
            }
        }
        if level.should_exit() {
            if let Err(e) = self.sync() {
                (core.error_handler)(&e);
            }
            if let Some(callback) = &core.exit_callback {
                callback(1);
            }
        }
    }

    // ---------------------------------------------------------------------
    // With / Named
    // ---------------------------------------------------------------------

    /// A child logger whose records carry `fields` ahead of call-site fields.
    pub fn with<I: IntoIterator<Item = Field>>(&self, fields: I) -> Logger {
        let mut scope = self.scope.to_vec();
        scope.extend(fields);
        Logger {
            core: Arc::clone(&self.core),
            name: Arc::clone(&self.name),
            scope: scope.into(),
        }
    }

    /// A child logger named `name`; nested names join with `.`.
    pub fn named(&self, name: &str) -> Logger {
        let name = if self.name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.name)
        };
        Logger {
            core: Arc::clone(&self.core),
            name: name.into(),
            scope: Arc::clone(&self.scope),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Spawns one consumer thread per shard (and the autoscale watcher when
    /// configured). Idempotent; an error only after `close`.
    pub fn start(&self) -> Result<()> {
        let core = &self.core;
        let mut lifecycle = core.lifecycle.lock();
        match core.state.load(Ordering::Acquire) {
            STATE_CLOSED => return Err(Error::AlreadyClosed),
            STATE_STARTED => return Ok(()),
            _ => {}
        }

        let transport = core.transport.read().clone();
        lifecycle.engine = Some(Core::spawn_engine(core, transport));

        if let Some(auto) = core.autoscaling.clone() {
            let stop = Arc::new(AtomicBool::new(false));
            let watcher_core = Arc::clone(core);
            let watcher_stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name("ringlog-autoscale".to_string())
                .spawn(move || watcher_loop(&watcher_core, &auto, &watcher_stop))
                .expect("failed to spawn autoscale watcher");
            lifecycle.watcher = Some((stop, handle));
        }

        core.state.store(STATE_STARTED, Ordering::Release);
        Ok(())
    }

    /// Waits until every record published before this call has been encoded
    /// and written, then syncs the sinks. Idempotent; a no-op after `close`.
    pub fn sync(&self) -> Result<()> {
        let core = &*self.core;
        match core.state.load(Ordering::Acquire) {
            STATE_CLOSED => return Ok(()),
            STATE_READY => {
                // Not started: drain inline. The lifecycle lock keeps this
                // the only consumer and excludes a concurrent start().
                let _lifecycle = core.lifecycle.lock();
                if core.state.load(Ordering::Acquire) == STATE_READY {
                    core.drain_inline();
                    return core.sink.sync().map_err(Error::SinkSync);
                }
            }
            _ => {}
        }

        let transport = core.transport.read().clone();
        for ring in transport.rings() {
            let barrier = ring.producer_cursor();
            let mut idler = Idler::new(IdleStrategy::Progressive, None);
            while ring.consumer_cursor() < barrier {
                idler.idle();
            }
        }
        core.sink.sync().map_err(Error::SinkSync)
    }

    /// Stops the consumers after draining, joins them, and syncs the sinks.
    /// Idempotent; log calls after close return without effect.
    pub fn close(&self) -> Result<()> {
        let core = &*self.core;

        // The watcher competes for the lifecycle lock inside scale_to, so it
        // is taken down before the lock is held across the join below.
        let watcher = {
            let mut lifecycle = core.lifecycle.lock();
            if core.state.load(Ordering::Acquire) == STATE_CLOSED {
                return Ok(());
            }
            lifecycle.watcher.take()
        };
        if let Some((stop, handle)) = watcher {
            stop.store(true, Ordering::Release);
            let _ = handle.join();
        }

        let mut lifecycle = core.lifecycle.lock();
        if core.state.load(Ordering::Acquire) == STATE_CLOSED {
            return Ok(());
        }
        let was_started = core.state.load(Ordering::Acquire) == STATE_STARTED;
        core.state.store(STATE_CLOSED, Ordering::Release);

        if let Some(engine) = lifecycle.engine.take() {
            engine.stop.store(true, Ordering::Release);
            for ring in engine.transport.rings() {
                if let Some(wake) = ring.wake_handle() {
                    wake.wake();
                }
            }
            for handle in engine.threads {
                let _ = handle.join();
            }
        } else if !was_started {
            // Never started: whatever was logged still reaches the sinks.
            core.drain_inline();
        }

        core.sink.sync().map_err(Error::SinkSync)
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn architecture(&self) -> Architecture {
        self.core.transport.read().architecture()
    }

    pub fn level(&self) -> Level {
        self.core.level
    }
}

impl Core {
    /// Hooks → encode → size check → sink write; every failure goes to the
    /// error handler and the consumer keeps running.
    fn process(&self, record: &mut Record, encoder: &mut dyn Encoder, buf: &mut Vec<u8>) {
        for hook in self.hooks.iter() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(record))) {
                self.stats.add_hook_panic();
                (self.error_handler)(&Error::PanicRecovered(panic_message(&payload)));
            }
        }

        buf.clear();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| encoder.encode(record, buf))) {
            (self.error_handler)(&Error::PanicRecovered(panic_message(&payload)));
            return;
        }

        if let Some(max) = self.max_record_bytes {
            if buf.len() > max {
                (self.error_handler)(&Error::BufferOverflow { len: buf.len(), max });
                return;
            }
        }

        match self.sink.write(buf) {
            Ok(n) => self.stats.add_bytes_written(n as u64),
            Err(e) => (self.error_handler)(&Error::SinkWrite(e)),
        }
    }

    /// Drains every ring on the calling thread. Only used while no consumer
    /// threads exist (before start, or close-without-start), under the
    /// lifecycle lock.
    fn drain_inline(&self) {
        let transport = self.transport.read().clone();
        let mut encoder = self.encoder.boxed_clone();
        let mut buf = Vec::with_capacity(4096);
        for ring in transport.rings() {
            ring.drain(&mut |rec| self.process(rec, encoder.as_mut(), &mut buf));
        }
    }

    fn spawn_engine(core: &Arc<Core>, transport: Arc<Transport>) -> Engine {
        let stop = Arc::new(AtomicBool::new(false));
        let threads = transport
            .rings()
            .iter()
            .enumerate()
            .map(|(i, ring)| {
                let core = Arc::clone(core);
                let ring = Arc::clone(ring);
                let stop = Arc::clone(&stop);
                thread::Builder::new()
                    .name(format!("ringlog-consumer-{i}"))
                    .spawn(move || consumer_loop(&core, &ring, &stop))
                    .expect("failed to spawn consumer thread")
            })
            .collect();
        Engine { transport, stop, threads }
    }

    /// Drain-swap-retire transition between transport shapes. Producers are
    /// paused only for the drain-and-swap window; no record is lost.
    fn scale_to(core: &Arc<Core>, target: Architecture) -> Result<()> {
        let mut lifecycle = core.lifecycle.lock();
        if core.state.load(Ordering::Acquire) != STATE_STARTED {
            return Ok(());
        }
        if core.transport.read().architecture() == target {
            return Ok(());
        }

        let shards = match target {
            Architecture::SingleRing => 1,
            Architecture::Sharded => core.num_shards,
        };
        let new_transport = Arc::new(Transport::new(
            shards,
            core.capacity,
            core.policy,
            &core.idle,
            &core.stats,
        )?);

        // New consumers idle on the empty rings until the swap lands.
        let new_engine = Core::spawn_engine(core, Arc::clone(&new_transport));

        {
            let mut active = core.transport.write();
            // Claims in flight were taken under the read half; the old
            // consumers are still running, so waiting out the barrier here
            // drains the outgoing transport to completion.
            for ring in active.rings() {
                let barrier = ring.producer_cursor();
                let mut idler = Idler::new(IdleStrategy::Progressive, None);
                while ring.consumer_cursor() < barrier {
                    idler.idle();
                }
            }
            *active = new_transport;
        }

        // Retire the drained generation.
        if let Some(old) = lifecycle.engine.replace(new_engine) {
            old.stop.store(true, Ordering::Release);
            for ring in old.transport.rings() {
                if let Some(wake) = ring.wake_handle() {
                    wake.wake();
                }
            }
            for handle in old.threads {
                let _ = handle.join();
            }
        }
        Ok(())
    }
}

fn consumer_loop(core: &Arc<Core>, ring: &Arc<Ring>, stop: &AtomicBool) {
    let mut encoder = core.encoder.boxed_clone();
    let mut idler = Idler::new(core.idle.clone(), ring.wake_handle());
    let mut buf = Vec::with_capacity(4096);

    loop {
        let n = ring.consume_batch(core.batch_hint, &mut |rec| {
            core.process(rec, encoder.as_mut(), &mut buf);
        });
        if n > 0 {
            idler.reset();
            continue;
        }
        // Exit only once the stop signal is up AND the ring is drained;
        // records claimed before the signal still arrive.
        if stop.load(Ordering::Acquire) && ring.is_empty() {
            break;
        }
        idler.idle();
    }
}

fn watcher_loop(core: &Arc<Core>, config: &AutoscaleConfig, stop: &AtomicBool) {
    let mut planner = ScalePlanner::new(config.clone());
    let mut last = core.stats.snapshot();

    while !stop.load(Ordering::Acquire) {
        // Sleep the window in slices so close() stays responsive.
        let deadline = Instant::now() + config.measurement_window;
        while Instant::now() < deadline {
            if stop.load(Ordering::Acquire) {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(remaining.min(Duration::from_millis(5)));
        }

        let now = core.stats.snapshot();
        let sample = WindowSample {
            writes: now.published.saturating_sub(last.published),
            contention: now.claim_contention.saturating_sub(last.claim_contention),
        };
        last = now;

        let current = core.transport.read().architecture();
        if let Some(target) = planner.observe(current, sample) {
            if let Err(e) = Core::scale_to(core, target) {
                (core.error_handler)(&e);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{EncoderConfig, JsonEncoder, TimeFormat};
    use crate::sink::TestSink;
    use std::sync::atomic::AtomicUsize;

    fn capturing_logger() -> (Logger, Arc<TestSink>) {
        let sink = TestSink::new();
        let logger = Config::new()
            .with_capacity(64)
            .with_encoder(Box::new(
                JsonEncoder::new(EncoderConfig::default().with_time_format(TimeFormat::UnixNanos)),
            ))
            .with_sink(sink.clone())
            .build()
            .unwrap();
        (logger, sink)
    }

    #[test]
    fn test_log_sync_delivers() {
        let (logger, sink) = capturing_logger();
        logger.start().unwrap();

        logger.info("hello", [Field::str("k", "v")]);
        logger.sync().unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("\"msg\":\"hello\""));
        assert!(lines[0].contains("\"k\":\"v\""));

        logger.close().unwrap();
    }

    #[test]
    fn test_level_gate_has_no_side_effects() {
        let sink = TestSink::new();
        let sampler = Arc::new(crate::TokenBucketSampler::new(
            100,
            0,
            Duration::from_secs(3600),
        ));
        let logger = Config::new()
            .with_level(Level::Warn)
            .with_capacity(16)
            .with_sampler(sampler.clone())
            .with_sink(sink.clone())
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.info("filtered", []);
        logger.sync().unwrap();

        assert!(sink.lines().is_empty());
        // The sampler never saw the filtered call.
        assert_eq!(sampler.stats().sampled + sampler.stats().dropped, 0);
        logger.close().unwrap();
    }

    #[test]
    fn test_named_and_with_share_core() {
        let (logger, sink) = capturing_logger();
        logger.start().unwrap();

        let child = logger.named("svc").named("api").with([Field::bool("scoped", true)]);
        assert_eq!(child.name(), "svc.api");
        child.info("m", [Field::int64("n", 1)]);
        child.sync().unwrap();

        let line = &sink.lines()[0];
        assert!(line.contains("\"logger\":\"svc.api\""));
        // Scope fields precede call-site fields.
        assert!(line.find("\"scoped\":true").unwrap() < line.find("\"n\":1").unwrap());
        logger.close().unwrap();
    }

    #[test]
    fn test_start_close_idempotent() {
        let (logger, _sink) = capturing_logger();
        logger.start().unwrap();
        logger.start().unwrap();
        logger.close().unwrap();
        logger.close().unwrap();
        assert!(matches!(logger.start(), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn test_log_after_close_is_ignored() {
        let (logger, sink) = capturing_logger();
        logger.start().unwrap();
        logger.close().unwrap();

        logger.info("late", []);
        assert!(sink.lines().is_empty());
        assert_eq!(logger.stats().published, 0);
    }

    #[test]
    fn test_sync_without_start_drains_inline() {
        let (logger, sink) = capturing_logger();
        logger.info("queued", []);
        assert!(sink.lines().is_empty());

        logger.sync().unwrap();
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_close_without_start_flushes() {
        let (logger, sink) = capturing_logger();
        logger.info("queued", []);
        logger.close().unwrap();
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_hooks_run_in_order_and_survive_panics() {
        let sink = TestSink::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);
        let errors = Arc::new(AtomicUsize::new(0));
        let errors2 = Arc::clone(&errors);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink.clone())
            .with_hook(Arc::new(move |_rec: &Record| o1.lock().push(1)))
            .with_hook(Arc::new(|_rec: &Record| panic!("hook exploded")))
            .with_hook(Arc::new(move |_rec: &Record| o2.lock().push(2)))
            .with_error_handler(Arc::new(move |err: &Error| {
                if matches!(err, Error::PanicRecovered(_)) {
                    errors2.fetch_add(1, Ordering::Relaxed);
                }
            }))
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.info("m", []);
        logger.sync().unwrap();
        logger.close().unwrap();

        assert_eq!(*order.lock(), vec![1, 2]);
        assert_eq!(errors.load(Ordering::Relaxed), 1);
        assert_eq!(logger.stats().hook_panics, 1);
        // The record was still encoded and written.
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_sink_write_failure_reaches_error_handler() {
        let sink = TestSink::new();
        sink.fail_writes(true);
        let failures = Arc::new(AtomicUsize::new(0));
        let failures2 = Arc::clone(&failures);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink)
            .with_error_handler(Arc::new(move |err: &Error| {
                if matches!(err, Error::SinkWrite(_)) {
                    failures2.fetch_add(1, Ordering::Relaxed);
                }
            }))
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.info("m", []);
        logger.sync().unwrap();
        assert_eq!(failures.load(Ordering::Relaxed), 1);
        logger.close().unwrap();
    }

    #[test]
    fn test_max_record_bytes_overflow() {
        let sink = TestSink::new();
        let overflows = Arc::new(AtomicUsize::new(0));
        let overflows2 = Arc::clone(&overflows);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink.clone())
            .with_max_record_bytes(64)
            .with_error_handler(Arc::new(move |err: &Error| {
                if matches!(err, Error::BufferOverflow { .. }) {
                    overflows2.fetch_add(1, Ordering::Relaxed);
                }
            }))
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.info("small", []);
        logger.info(&"x".repeat(200), []);
        logger.sync().unwrap();
        logger.close().unwrap();

        assert_eq!(overflows.load(Ordering::Relaxed), 1);
        assert_eq!(sink.lines().len(), 1);
    }

    #[test]
    fn test_panic_callback_fires_on_producer_thread() {
        let sink = TestSink::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink)
            .development()
            .with_panic_callback(Arc::new(move || {
                fired2.fetch_add(1, Ordering::Relaxed);
            }))
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.dpanic("dev panic", []);
        logger.panic("always", []);
        assert_eq!(fired.load(Ordering::Relaxed), 2);
        logger.close().unwrap();
    }

    #[test]
    fn test_dpanic_quiet_outside_development() {
        let sink = TestSink::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink)
            .with_panic_callback(Arc::new(move || {
                fired2.fetch_add(1, Ordering::Relaxed);
            }))
            .build()
            .unwrap();
        logger.start().unwrap();
        logger.dpanic("prod", []);
        assert_eq!(fired.load(Ordering::Relaxed), 0);
        logger.close().unwrap();
    }

    #[test]
    fn test_fatal_syncs_then_exits() {
        let sink = TestSink::new();
        let exited = Arc::new(Mutex::new(None));
        let exited2 = Arc::clone(&exited);

        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink.clone())
            .with_exit_callback(Arc::new(move |code: i32| {
                *exited2.lock() = Some(code);
            }))
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.fatal("going down", []);
        // By the time the exit callback has fired, the record is in the sink.
        assert_eq!(*exited.lock(), Some(1));
        assert!(sink.contents_utf8().contains("going down"));
        logger.close().unwrap();
    }

    #[test]
    fn test_caller_capture() {
        let sink = TestSink::new();
        let logger = Config::new()
            .with_capacity(16)
            .with_sink(sink.clone())
            .with_caller()
            .build()
            .unwrap();
        logger.start().unwrap();

        logger.info("here", []);
        logger.sync().unwrap();
        logger.close().unwrap();

        let line = &sink.lines()[0];
        assert!(line.contains("\"caller\":\"logger.rs:"), "line: {line}");
    }
}
