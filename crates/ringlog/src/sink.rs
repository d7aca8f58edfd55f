//! Byte-accepting endpoints with a `sync` capability.
//!
//! Sinks are shared across shard consumers, so every implementation
//! serializes internally; the fan-out sink adds no lock of its own and relies
//! on its children.

use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A byte sink with an explicit durability point.
pub trait WriteSyncer: Send + Sync {
    /// Writes the whole buffer, returning the byte count on success.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Forces buffered data to the underlying medium.
    fn sync(&self) -> io::Result<()>;
}

// ---------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------

/// Wraps any `io::Write`; `sync` flushes but asserts nothing about
/// durability.
pub struct StreamSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: Mutex::new(writer) }
    }
}

impl<W: Write + Send> WriteSyncer for StreamSink<W> {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

// ---------------------------------------------------------------------
// File
// ---------------------------------------------------------------------

/// Owns a file descriptor; writes are serialized and `sync` is a real fsync.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    /// Opens `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl WriteSyncer for FileSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.file.lock().sync_all()
    }
}

// ---------------------------------------------------------------------
// Buffered
// ---------------------------------------------------------------------

/// Default in-memory buffer for [`BufferedSink`].
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Wraps another sink behind an in-memory buffer. Flushes when the buffer
/// fills or on `sync`; a flush error surfaces from whichever call triggered
/// it.
pub struct BufferedSink {
    inner: Arc<dyn WriteSyncer>,
    buf: Mutex<Vec<u8>>,
    capacity: usize,
}

impl BufferedSink {
    pub fn new(inner: Arc<dyn WriteSyncer>) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: Arc<dyn WriteSyncer>, capacity: usize) -> Self {
        Self {
            inner,
            buf: Mutex::new(Vec::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    fn flush_locked(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        if !buf.is_empty() {
            self.inner.write(buf)?;
            buf.clear();
        }
        Ok(())
    }
}

impl WriteSyncer for BufferedSink {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.buf.lock();
        if buf.len() + data.len() > self.capacity {
            self.flush_locked(&mut buf)?;
        }
        if data.len() >= self.capacity {
            // Oversized payloads bypass the buffer entirely.
            self.inner.write(data)?;
        } else {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn sync(&self) -> io::Result<()> {
        let mut buf = self.buf.lock();
        self.flush_locked(&mut buf)?;
        self.inner.sync()
    }
}

// ---------------------------------------------------------------------
// Discard
// ---------------------------------------------------------------------

/// Accepts and counts bytes; useful for benchmarks and as a default.
#[derive(Default)]
pub struct DiscardSink {
    bytes: AtomicU64,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_discarded(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl WriteSyncer for DiscardSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Multi (fan-out)
// ---------------------------------------------------------------------

/// Ordered fan-out over several sinks.
///
/// `write` and `sync` call every child even after a failure (best-effort
/// durability) and report the first error. Membership changes take a write
/// lock; they are rare and need not be lock-free.
pub struct MultiSink {
    sinks: RwLock<Vec<Arc<dyn WriteSyncer>>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn WriteSyncer>>) -> Self {
        Self { sinks: RwLock::new(sinks) }
    }

    pub fn add(&self, sink: Arc<dyn WriteSyncer>) {
        self.sinks.write().push(sink);
    }

    /// Removes a sink by identity. Returns `true` if it was present.
    pub fn remove(&self, sink: &Arc<dyn WriteSyncer>) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|s| !Arc::ptr_eq(s, sink));
        sinks.len() != before
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }
}

impl WriteSyncer for MultiSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut first_err = None;
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.write(buf) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(buf.len()),
        }
    }

    fn sync(&self) -> io::Result<()> {
        let mut first_err = None;
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.sync() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------
// Capture (test support)
// ---------------------------------------------------------------------

/// Captures everything written, with optional failure injection. Intended
/// for tests and host-side assertions.
#[derive(Default)]
pub struct TestSink {
    captured: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
    fail_syncs: AtomicBool,
    syncs: AtomicU64,
}

impl TestSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contents(&self) -> Vec<u8> {
        self.captured.lock().clone()
    }

    pub fn contents_utf8(&self) -> String {
        String::from_utf8(self.contents()).expect("captured output was not UTF-8")
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents_utf8().lines().map(str::to_string).collect()
    }

    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn fail_syncs(&self, fail: bool) {
        self.fail_syncs.store(fail, Ordering::Relaxed);
    }
}

impl WriteSyncer for TestSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.captured.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.syncs.fetch_add(1, Ordering::Relaxed);
        if self.fail_syncs.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"));
        }
        Ok(())
    }
}
