use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// An in-memory output sink that can be shared between threads.
///
/// Clones share the same buffer. Each `write` call appends its whole buffer
/// under one lock, so a record committed with a single `write_all` is never
/// interleaved with another thread's record.
///
/// An optional capacity models a full downstream device: a write that would
/// exceed it fails with [`io::ErrorKind::WriteZero`] and appends nothing.
///
/// # Examples
///
/// ```
/// use std::io::Write;
/// use audit_core::SharedSink;
///
/// let sink = SharedSink::new();
/// let mut writer = sink.clone();
/// writer.write_all(b"{\"type\":\"request\"}\n").unwrap();
///
/// assert_eq!(sink.lines(), vec!["{\"type\":\"request\"}"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    capacity: Option<usize>,
}

impl SharedSink {
    /// Creates an empty, unbounded sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sink that holds at most `capacity` bytes.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            buffer: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Returns a copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.with_buffer(|buf| buf.to_vec())
    }

    /// Returns the records written so far, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        self.with_buffer(|buf| {
            String::from_utf8_lossy(buf)
                .lines()
                .map(str::to_string)
                .collect()
        })
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.with_buffer(|buf| buf.len())
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_buffer<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        // A poisoned lock still holds whole records.
        let guard = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Vec<u8>>> {
        self.buffer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.lock()?;
        if let Some(capacity) = self.capacity {
            if buffer.len() + buf.len() > capacity {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "sink is full"));
            }
        }
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let sink = SharedSink::new();
        let mut a = sink.clone();
        let mut b = sink.clone();

        a.write_all(b"one\n").unwrap();
        b.write_all(b"two\n").unwrap();

        assert_eq!(sink.lines(), vec!["one", "two"]);
        assert_eq!(sink.len(), 8);
    }

    #[test]
    fn full_sink_rejects_without_appending() {
        let mut sink = SharedSink::with_capacity_limit(6);
        sink.write_all(b"abc\n").unwrap();

        let err = sink.write_all(b"defg\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(sink.contents(), b"abc\n");
    }

    #[test]
    fn new_sink_is_empty() {
        let sink = SharedSink::new();
        assert!(sink.is_empty());
        assert!(sink.lines().is_empty());
    }
}
